//! qgate - polyglot quality gates
//!
//! Command-line entry point. Exit status: `0` clean, `1` violations, `2`
//! system failure.

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use qgate::gates::god_object::Baseline;
use qgate::orchestrator::LockStatus;
use qgate::policy::ClassifiedFinding;
use qgate::scope::ExclusionFilter;
use qgate::{
    Context, EnforcementTable, FileScopeResolver, GateName, GateStatus, Orchestrator, QgateConfig,
    QgateError, RunLock, RunOptions, RunReport, EXIT_OK, EXIT_SYSTEM_FAILURE,
};

#[derive(Parser)]
#[command(name = "qgate")]
#[command(version)]
#[command(about = "Quality gates for commits, pushes and CI runs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long = "project-dir", global = true, default_value = ".")]
    project: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Print nothing; the exit code and .qgate/report.json carry the result
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log line format
    #[arg(long, value_enum, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run quality gates (default)
    Run(RunArgs),

    /// List the gates and their enforcement levels per context
    Gates,

    /// Record current file sizes as the god-object baseline
    Baseline,

    /// Inspect or clear the run lock
    Lock {
        #[command(subcommand)]
        action: LockAction,
    },
}

#[derive(Subcommand)]
enum LockAction {
    /// Show whether a run holds the lock
    Status,
    /// Remove the lock marker
    Clear,
}

#[derive(Args, Clone, Debug, Default)]
struct RunArgs {
    /// Invocation context (inferred from CI / --push when omitted)
    #[arg(long, value_enum)]
    context: Option<Context>,

    /// Infer the push context when --context is not given
    #[arg(long)]
    push: bool,

    /// Comma-separated subset of gates to run
    #[arg(long, value_name = "GATES")]
    gates: Option<String>,

    /// Bypass a live run lock
    #[arg(long)]
    force: bool,

    /// Print the report JSON to stdout
    #[arg(long)]
    json: bool,

    /// Hidden-TODO confidence threshold in [-1, 1]
    #[arg(long, allow_negative_numbers = true)]
    threshold: Option<f64>,

    /// Only the crisis tier of the god-object gate blocks
    #[arg(long)]
    crisis_mode: bool,

    /// Per-gate timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Suggest a structured TODO template for unstructured findings
    #[arg(long)]
    suggest_templates: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let project_dir = cli.project.canonicalize().unwrap_or(cli.project.clone());
    if !project_dir.is_dir() {
        eprintln!(
            "{} Project directory does not exist: {}",
            "Error:".red().bold(),
            project_dir.display()
        );
        std::process::exit(EXIT_SYSTEM_FAILURE);
    }

    let code = match cli.command {
        None => run(&project_dir, &cli.run, cli.quiet).await,
        Some(Commands::Run(ref args)) => run(&project_dir, args, cli.quiet).await,
        Some(Commands::Gates) => list_gates(&project_dir),
        Some(Commands::Baseline) => match write_baseline(&project_dir).await {
            Ok(()) => EXIT_OK,
            Err(e) => fail(&format!("{e:#}")),
        },
        Some(Commands::Lock { action }) => lock_command(&project_dir, action),
    };
    std::process::exit(code);
}

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "qgate=debug,info"
    } else if cli.quiet {
        "warn"
    } else {
        "qgate=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn fail(message: &str) -> i32 {
    eprintln!("{} {}", "Error:".red().bold(), message);
    EXIT_SYSTEM_FAILURE
}

/// Configuration with a malformed file degraded to defaults, plus the
/// run-level notice saying so.
fn load_config(project_dir: &Path) -> (QgateConfig, Option<String>) {
    match QgateConfig::load(project_dir) {
        Ok(config) => (config, None),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed configuration, using defaults");
            let notice = format!("Configuration ignored, using defaults: {}", e);
            (QgateConfig::default(), Some(notice))
        }
    }
}

// ============================================================================
// run
// ============================================================================

async fn run(project_dir: &Path, args: &RunArgs, quiet: bool) -> i32 {
    // Gate names are validated before anything else happens.
    let gates = match args.gates.as_deref().map(GateName::parse_list).transpose() {
        Ok(Some(gates)) if gates.is_empty() => return fail("--gates named no gates"),
        Ok(gates) => gates.unwrap_or_else(|| GateName::ALL.to_vec()),
        Err(e) => return fail(&e.to_string()),
    };

    let (mut config, config_notice) = load_config(project_dir);
    if let Some(threshold) = args.threshold {
        if !(-1.0..=1.0).contains(&threshold) {
            return fail("--threshold must be within [-1, 1]");
        }
        config.hidden_todo.confidence_threshold = threshold;
    }
    if args.crisis_mode {
        config.god_object.crisis_mode = true;
    }
    if args.suggest_templates {
        config.hidden_todo.suggest_templates = true;
    }
    if let Some(secs) = args.timeout {
        config.timeouts.default_secs = secs;
        config.timeouts.per_gate.clear();
    }

    let context = args.context.unwrap_or_else(|| Context::from_env(args.push));
    let options = RunOptions::new(context)
        .with_gates(gates)
        .with_force(args.force)
        .with_notices(config_notice.into_iter().collect());

    let report = match Orchestrator::new(project_dir, config).run(&options).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return e.exit_code();
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => return fail(&e.to_string()),
        }
    } else if !quiet {
        print_summary(&report);
    }
    report.exit_code()
}

fn location(f: &ClassifiedFinding) -> String {
    match f.finding.line {
        Some(line) => format!("{}:{}", f.finding.file, line),
        None => f.finding.file.clone(),
    }
}

fn print_summary(report: &RunReport) {
    println!(
        "{} {} context, {} files ({:?})",
        "qgate".bold(),
        report.context,
        report.files_scoped,
        report.scope_source
    );

    for gate in &report.gates {
        let status = match gate.status {
            GateStatus::Passed => "passed".green(),
            GateStatus::Failed => "failed".red(),
            GateStatus::Timeout => "timeout".red().bold(),
            GateStatus::Error => "error".red().bold(),
        };
        println!(
            "  {:<14} {:<8} {} violations, {} warnings ({} ms)",
            gate.gate.as_str(),
            status,
            gate.violations,
            gate.warnings,
            gate.duration_ms
        );
    }

    if !report.violations.is_empty() {
        println!("\n{}", "Violations:".red().bold());
        for v in &report.violations {
            println!(
                "  {} [{}] {}",
                location(v).bold(),
                v.finding.rule,
                v.finding.message
            );
            if let Some(ref suggestion) = v.finding.suggestion {
                for line in suggestion.lines() {
                    println!("      {}", line.dimmed());
                }
            }
        }
    }

    if !report.warnings.is_empty() {
        println!("\n{}", "Warnings:".yellow().bold());
        for w in &report.warnings {
            let waived = match w.waiver {
                Some(ref waiver) => format!(" (waived: {})", waiver.reason).dimmed().to_string(),
                None => String::new(),
            };
            println!(
                "  {} [{}] {}{}",
                location(w),
                w.finding.rule,
                w.finding.message,
                waived
            );
        }
    }

    for notice in &report.notices {
        println!("{} {}", "Notice:".yellow(), notice);
    }

    let verdict = if report.passed {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "\n{} {} violations, {} warnings in {} ms",
        verdict,
        report.violations.len(),
        report.warnings.len(),
        report.duration_ms
    );
}

// ============================================================================
// gates / baseline / lock
// ============================================================================

fn list_gates(project_dir: &Path) -> i32 {
    let (config, _) = load_config(project_dir);
    let tables: Vec<EnforcementTable> = Context::ALL
        .iter()
        .map(|&c| EnforcementTable::resolve(c, &config.enforcement))
        .collect();

    println!(
        "{:<14} {:<8} {:<8} {:<8} {}",
        "GATE".bold(),
        "commit",
        "push",
        "ci",
        "DESCRIPTION".bold()
    );
    for gate in GateName::ALL {
        let levels: Vec<String> = tables.iter().map(|t| t.level(gate).to_string()).collect();
        println!(
            "{:<14} {:<8} {:<8} {:<8} {}",
            gate.as_str(),
            levels[0],
            levels[1],
            levels[2],
            gate.description()
        );
    }
    EXIT_OK
}

async fn write_baseline(project_dir: &Path) -> anyhow::Result<()> {
    let (config, _) = load_config(project_dir);
    let filter = ExclusionFilter::from_config(project_dir, &config.scope);
    let scope = FileScopeResolver::system(project_dir, filter).resolve(Context::Ci);
    for notice in &scope.notices {
        warn!("{}", notice);
    }

    let baseline = Baseline::capture(&scope.files).await;
    let path = QgateConfig::baseline_path(project_dir);
    baseline
        .save(&path)
        .with_context(|| format!("Failed to write baseline to {}", path.display()))?;
    println!(
        "{} Recorded {} files in {}",
        "OK".green().bold(),
        baseline.files.len(),
        path.display()
    );
    Ok(())
}

fn lock_command(project_dir: &Path, action: LockAction) -> i32 {
    let lock = RunLock::new(QgateConfig::lock_path(project_dir));
    let result: Result<(), QgateError> = match action {
        LockAction::Status => lock.status().map(|status| match status {
            LockStatus::Free => println!("{} no run in progress", "free".green()),
            LockStatus::Live(m) => println!(
                "{} held by pid {} since {}",
                "locked".red().bold(),
                m.pid,
                m.timestamp.to_rfc3339()
            ),
            LockStatus::Stale(m) => println!(
                "{} left by pid {} at {}; the next run reclaims it",
                "stale".yellow(),
                m.pid,
                m.timestamp.to_rfc3339()
            ),
            LockStatus::Corrupt(e) => println!("{} unreadable marker: {}", "corrupt".yellow(), e),
        }),
        LockAction::Clear => lock.clear().map(|removed| match removed {
            Some(m) => println!("{} removed lock held by pid {}", "OK".green().bold(), m.pid),
            None => println!("{} no lock to clear", "OK".green().bold()),
        }),
    };
    match result {
        Ok(()) => EXIT_OK,
        Err(e) => fail(&e.to_string()),
    }
}
