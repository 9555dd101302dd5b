//! Integration tests for the qgate CLI

use assert_cmd::cargo;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the qgate binary
fn qgate(project: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("qgate"));
    cmd.arg("--project-dir")
        .arg(project)
        .env_remove("CI")
        .env_remove("QGATE_SUMMARY_FILE")
        .env_remove("GITHUB_STEP_SUMMARY")
        .env_remove("RUST_LOG");
    cmd
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn read_report(root: &Path) -> Value {
    let content = fs::read_to_string(root.join(".qgate/report.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn rules(report: &Value, list: &str) -> Vec<String> {
    report[list]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["type"].as_str().unwrap().to_string())
        .collect()
}

fn numbered_lines(n: usize) -> String {
    (0..n).map(|i| format!("let value_{i} = compute({i});\n")).collect()
}

// ============================================================================
// Surface
// ============================================================================

#[test]
fn test_help() {
    let temp = TempDir::new().unwrap();
    qgate(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Quality gates"));
}

#[test]
fn test_gates_lists_closed_set_with_levels() {
    let temp = TempDir::new().unwrap();
    qgate(temp.path())
        .arg("gates")
        .assert()
        .success()
        .stdout(predicate::str::contains("hidden_todo"))
        .stdout(predicate::str::contains("god_object"))
        .stdout(predicate::str::contains("block"));
}

#[test]
fn test_unknown_gate_fails_before_any_work() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.rs", "fn a() -> u32 {\n    1\n}\n");

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "naming,bogus_gate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bogus_gate"))
        .stderr(predicate::str::contains("hidden_todo"));

    assert!(!temp.path().join(".qgate/report.json").exists());
    assert!(!temp.path().join(".qgate/run.lock").exists());
}

#[test]
fn test_out_of_range_threshold_is_rejected() {
    let temp = TempDir::new().unwrap();
    qgate(temp.path())
        .args(["--context", "ci", "--threshold", "1.5"])
        .assert()
        .code(2);
}

// ============================================================================
// Gate behavior end to end
// ============================================================================

#[test]
fn test_broad_keyword_blocks_in_ci() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/login.rs",
        "fn login() {\n    // TODO: implement auth\n}\n",
    );

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "hidden_todo", "--quiet"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());

    let report = read_report(temp.path());
    assert_eq!(rules(&report, "violations"), vec!["BROAD_KEYWORD"]);
    assert_eq!(report["violations"][0]["line"], 2);
    assert_eq!(report["violations"][0]["level"], "block");
    assert_eq!(report["scopeSource"], "full_tree_fallback");
    assert_eq!(report["passed"], false);
}

#[test]
fn test_declared_placeholder_governs_the_promise() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/login.rs",
        concat!(
            "fn login() {\n",
            "    // @placeholder {\"id\":\"auth-sso\",\"scope\":\"auth\",\"reason\":\"SSO pending\",\"impact\":\"partial\",\"fallback\":\"password login\"}\n",
            "    // TODO: implement auth\n",
            "}\n"
        ),
    );

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "hidden_todo,placeholder", "--quiet"])
        .assert()
        .success();

    let report = read_report(temp.path());
    assert!(rules(&report, "violations").is_empty());
}

#[test]
fn test_commit_context_only_warns() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/login.rs", "fn login() {\n    // TODO: implement auth\n}\n");

    qgate(temp.path())
        .args(["--context", "commit", "--gates", "hidden_todo", "--quiet"])
        .assert()
        .success();

    let report = read_report(temp.path());
    assert_eq!(rules(&report, "warnings"), vec!["BROAD_KEYWORD"]);
}

#[test]
fn test_god_object_growth_reports_tier_and_regression() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/big.rs", &numbered_lines(2100));
    write(
        temp.path(),
        ".qgate/god-object-baseline.json",
        r#"{"files":{"src/big.rs":1700}}"#,
    );

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "god_object", "--quiet"])
        .assert()
        .code(1);

    let report = read_report(temp.path());
    assert_eq!(
        rules(&report, "violations"),
        vec!["GOD_OBJECT_CRITICAL", "GOD_OBJECT_REGRESSION"]
    );

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "god_object", "--crisis-mode", "--quiet"])
        .assert()
        .success();
}

#[test]
fn test_exception_waives_finding() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/login.rs", "fn login() {\n    // TODO: implement auth\n}\n");
    write(
        temp.path(),
        ".qgate/exceptions.json",
        r#"{"exceptions":[{"id":"EX-1","gate":"hidden_todo","matchRule":{"files":["src/login.rs"]},"reason":"Auth lands next sprint","approvedBy":"lead","expiresAt":"2999-01-01T00:00:00Z"}]}"#,
    );

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "hidden_todo", "--quiet"])
        .assert()
        .success();

    let report = read_report(temp.path());
    assert_eq!(report["warnings"][0]["waiver"]["reason"], "Auth lands next sprint");
}

#[test]
fn test_json_output_matches_report_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/clean.rs", "fn clean() -> u32 {\n    1\n}\n");

    let output = qgate(temp.path())
        .args(["--context", "ci", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let printed: Value = serde_json::from_slice(&output).unwrap();
    let written = read_report(temp.path());
    assert_eq!(printed["runId"], written["runId"]);
    assert_eq!(printed["gates"].as_array().unwrap().len(), 6);
    assert_eq!(printed["passed"], true);
}

#[test]
fn test_repeated_runs_report_identical_findings() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/login.rs", "fn login() {\n    // TODO: implement auth\n}\n");
    write(temp.path(), "src/data_v2.rs", "fn load() {\n    unimplemented!()\n}\n");
    write(temp.path(), "README.md", "A revolutionary tool.\n");

    let mut runs = Vec::new();
    for _ in 0..2 {
        qgate(temp.path())
            .args(["--context", "ci", "--quiet"])
            .assert()
            .code(1);
        let report = read_report(temp.path());
        runs.push((report["violations"].clone(), report["warnings"].clone()));
    }
    assert_eq!(runs[0], runs[1]);
}

#[test]
fn test_malformed_config_is_a_report_notice() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/clean.rs", "fn clean() -> u32 {\n    1\n}\n");
    write(temp.path(), ".qgate/config.toml", "[hidden_todo\nconfidence_threshold = ");

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "naming", "--quiet"])
        .assert()
        .success();

    let report = read_report(temp.path());
    let notices = report["notices"].as_array().unwrap();
    assert!(notices
        .iter()
        .any(|n| n.as_str().unwrap().contains("Configuration ignored")));
}

#[test]
fn test_markup_and_ci_config_comments_are_scanned() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "templates/login.html",
        "<form>\n  <!-- TODO: wire the login form -->\n</form>\n",
    );
    write(
        temp.path(),
        ".github/workflows/ci.yml",
        "jobs:\n  test:\n    # TODO: add clippy\n    runs-on: ubuntu-latest\n",
    );

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "hidden_todo", "--quiet"])
        .assert()
        .code(1);

    let report = read_report(temp.path());
    let mut files: Vec<&str> = report["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["file"].as_str().unwrap())
        .collect();
    files.sort();
    assert_eq!(files, vec![".github/workflows/ci.yml", "templates/login.html"]);
}

#[test]
fn test_summary_is_appended_to_configured_file() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/clean.rs", "fn clean() -> u32 {\n    1\n}\n");
    let summary = temp.path().join("summary.md");

    qgate(temp.path())
        .args(["--context", "ci", "--gates", "naming", "--quiet"])
        .env("QGATE_SUMMARY_FILE", &summary)
        .assert()
        .success();

    let md = fs::read_to_string(summary).unwrap();
    assert!(md.contains("## qgate: passed (ci)"));
}

// ============================================================================
// Run lock
// ============================================================================

fn write_lock(root: &Path, pid: u32, timestamp: &str) {
    write(
        root,
        ".qgate/run.lock",
        &format!(r#"{{"pid":{pid},"timestamp":"{timestamp}"}}"#),
    );
}

#[test]
fn test_live_lock_blocks_until_forced() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.rs", "fn a() -> u32 {\n    1\n}\n");
    let now = chrono::Utc::now().to_rfc3339();
    write_lock(temp.path(), 999_999, &now);

    qgate(temp.path())
        .args(["--context", "ci"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("999999"));
    assert!(!temp.path().join(".qgate/report.json").exists());

    qgate(temp.path())
        .args(["--context", "ci", "--quiet"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("999999"));

    qgate(temp.path())
        .args(["--context", "ci", "--force", "--quiet"])
        .assert()
        .success();
}

#[test]
fn test_stale_lock_is_reclaimed() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.rs", "fn a() -> u32 {\n    1\n}\n");
    write_lock(temp.path(), 4242, "2020-01-01T00:00:00Z");

    qgate(temp.path())
        .args(["--context", "ci", "--quiet"])
        .assert()
        .success();

    let report = read_report(temp.path());
    let notices = report["notices"].as_array().unwrap();
    assert!(notices
        .iter()
        .any(|n| n.as_str().unwrap().contains("4242")));
    assert!(!temp.path().join(".qgate/run.lock").exists());
}

#[test]
fn test_lock_status_and_clear() {
    let temp = TempDir::new().unwrap();
    let now = chrono::Utc::now().to_rfc3339();
    write_lock(temp.path(), 31337, &now);

    qgate(temp.path())
        .args(["lock", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("31337"));

    qgate(temp.path())
        .args(["lock", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));

    qgate(temp.path())
        .args(["lock", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("free"));
}

#[test]
fn test_baseline_subcommand_records_sizes() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "src/a.rs", &numbered_lines(12));

    qgate(temp.path()).arg("baseline").assert().success();

    let content = fs::read_to_string(temp.path().join(".qgate/god-object-baseline.json")).unwrap();
    let baseline: Value = serde_json::from_str(&content).unwrap();
    assert_eq!(baseline["files"]["src/a.rs"], 12);
}
