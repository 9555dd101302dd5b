//! End-to-end tests of the library pipeline: scope, gates, policy, report.
//!
//! Git is mocked; detectors are real unless a test swaps one for a
//! `MockDetector` to script a failure.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use qgate::gates::hidden_todo::HiddenTodoDetector;
use qgate::scope::ExclusionFilter;
use qgate::testing::{MockDetector, MockGitOperations};
use qgate::{
    Context, Detector, FileScopeResolver, FileSet, GateName, GateStatus, Orchestrator,
    QgateConfig, RunOptions,
};
use tempfile::TempDir;

const LOGIN: &str = "fn login() {\n    // TODO: implement auth\n}\n";

const MIXED: &str = r#"fn handler(req: Request) -> Response {
    // In a real implementation this would validate the session
    let user = lookup(req);
    // temporary solution until the cache lands
    respond(user)
}

fn export() -> Report {
    unimplemented!()
}

/// Parses the header.
fn parse() {}
"#;

fn project(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for (relative, content) in files {
        let path = temp.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    temp
}

fn tracked(root: &Path, files: &[&str]) -> FileScopeResolver<MockGitOperations> {
    FileScopeResolver::new(
        root,
        MockGitOperations::new().with_tracked(files),
        ExclusionFilter::default(),
    )
}

#[tokio::test]
async fn test_ci_run_with_real_detectors() {
    let temp = project(&[("src/login.rs", LOGIN), ("node_modules/x/index.js", "// TODO\n")]);
    let orchestrator = Orchestrator::new(temp.path(), QgateConfig::default());
    let options = RunOptions::new(Context::Ci).with_gates(vec![GateName::HiddenTodo]);

    let report = orchestrator
        .run_with_resolver(
            &options,
            &tracked(temp.path(), &["src/login.rs", "node_modules/x/index.js"]),
        )
        .await
        .unwrap();

    assert_eq!(report.files_scoped, 1);
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].finding.rule, "BROAD_KEYWORD");
    assert_eq!(report.violations[0].finding.file, "src/login.rs");
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_failing_gates_do_not_abort_the_run() {
    let temp = project(&[("src/login.rs", LOGIN)]);
    let orchestrator = Orchestrator::new(temp.path(), QgateConfig::default())
        .with_timeout(Duration::from_millis(300))
        .with_detector(Arc::new(
            MockDetector::new(GateName::Duplication).hanging(Duration::from_secs(60)),
        ))
        .with_detector(Arc::new(MockDetector::new(GateName::Naming).failing("index unreadable")));
    let options = RunOptions::new(Context::Ci).with_gates(vec![
        GateName::Naming,
        GateName::Duplication,
        GateName::HiddenTodo,
    ]);

    let report = orchestrator
        .run_with_resolver(&options, &tracked(temp.path(), &["src/login.rs"]))
        .await
        .unwrap();

    let rules: Vec<&str> = report
        .violations
        .iter()
        .map(|v| v.finding.rule.as_str())
        .collect();
    assert_eq!(rules, vec!["GATE_ERROR", "TIMEOUT", "BROAD_KEYWORD"]);
    assert_eq!(report.gates[0].status, GateStatus::Error);
    assert!(report.gates[0]
        .error
        .as_deref()
        .unwrap()
        .contains("index unreadable"));
    assert_eq!(report.gates[1].status, GateStatus::Timeout);
    assert_eq!(report.gates[2].status, GateStatus::Failed);
}

#[tokio::test]
async fn test_raising_threshold_never_adds_findings() {
    let temp = project(&[("src/handler.rs", MIXED), ("src/login.rs", LOGIN)]);
    let files = FileSet::new(temp.path(), vec![PathBuf::from("src/handler.rs"), PathBuf::from("src/login.rs")]);

    let mut previous = usize::MAX;
    for threshold in [-1.0, -0.5, 0.0, 0.3, 0.5, 0.7, 0.9, 1.0] {
        let mut config = QgateConfig::default().hidden_todo;
        config.confidence_threshold = threshold;
        config.broad_keyword_bypass = false;
        let found = HiddenTodoDetector::new(config)
            .scan(&files)
            .await
            .unwrap()
            .findings
            .len();
        assert!(found <= previous, "threshold {threshold} found {found} > {previous}");
        previous = found;
    }
}

#[tokio::test]
async fn test_broad_keyword_bypass_survives_high_threshold() {
    let temp = project(&[("src/login.rs", LOGIN)]);
    let files = FileSet::new(temp.path(), vec![PathBuf::from("src/login.rs")]);

    let mut config = QgateConfig::default().hidden_todo;
    config.confidence_threshold = 1.0;
    let findings = HiddenTodoDetector::new(config).scan(&files).await.unwrap().findings;
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].rule, "BROAD_KEYWORD");
}
