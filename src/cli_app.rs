//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use pos_system_tests::array::command::SystemCommandRunner;
use pos_system_tests::array::process::OsProcessControl;
use pos_system_tests::core::config::Config;
use pos_system_tests::core::errors::HarnessError;
use pos_system_tests::harness::context::TestContext;
use pos_system_tests::harness::lifecycle::{RunReport, run_test};
use pos_system_tests::harness::result::{ResultStore, TestResult, Verdict};
use pos_system_tests::harness::scenario::{RenameVolumeSpecialChar, SystemTest, find_test, registry};
use pos_system_tests::logger::jsonl::{JsonlConfig, JsonlWriter};

/// POS system tests: drive a running storage array and record verdicts.
#[derive(Debug, Parser)]
#[command(
    name = "pst",
    author,
    version,
    about = "POS system tests - end-to-end array checks",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Echo harness progress to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run one registered test and record its verdict.
    Run(TestArgs),
    /// Print the stored result of a test.
    Show(TestArgs),
    /// List registered tests.
    List,
    /// Print the effective configuration.
    Config,
}

#[derive(Debug, Clone, Args)]
struct TestArgs {
    /// Test name; `-` and `_` are interchangeable, case is ignored.
    #[arg(value_name = "TEST")]
    test: Option<String>,
}

impl TestArgs {
    fn resolve(&self) -> Result<Box<dyn SystemTest>, CliError> {
        match &self.test {
            Some(name) => find_test(name).map_err(CliError::from),
            None => Ok(Box::new(RenameVolumeSpecialChar)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Fixture, invocation, or reply failure; no result file was recorded.
    #[error("run aborted, no result recorded: {0}")]
    Aborted(String),
    /// Other runtime failure (teardown, IO, serialization).
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI. A completed run exits 0
    /// whatever its verdict.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Aborted(_) | Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<HarnessError> for CliError {
    fn from(err: HarnessError) -> Self {
        if err.is_infrastructure() {
            return Self::Aborted(err.to_string());
        }
        match err {
            HarnessError::InvalidConfig { .. }
            | HarnessError::MissingConfig { .. }
            | HarnessError::ConfigParse { .. }
            | HarnessError::UnknownTest { .. } => Self::User(err.to_string()),
            other => Self::Runtime(other.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_one(cli, args),
        Command::Show(args) => run_show(cli, args),
        Command::List => run_list(cli),
        Command::Config => run_config(cli),
    }
}

fn run_one(cli: &Cli, args: &TestArgs) -> Result<(), CliError> {
    let test = args.resolve()?;
    let config = Config::load(cli.config.as_deref())?;
    let log = JsonlWriter::open(JsonlConfig::from_paths(&config.paths));
    let mut ctx = TestContext::new(
        config,
        Arc::new(SystemCommandRunner),
        Arc::new(OsProcessControl),
        log,
    );
    ctx.verbose = cli.verbose;

    let report = run_test(test.as_ref(), &mut ctx)?;
    match output_mode(cli) {
        OutputMode::Human => print_report_human(&report),
        OutputMode::Json => write_json_line(&report_json(&report))?,
    }
    Ok(())
}

fn run_show(cli: &Cli, args: &TestArgs) -> Result<(), CliError> {
    let test = args.resolve()?;
    let config = Config::load(cli.config.as_deref())?;
    let store = ResultStore::new(config.paths.results_dir.clone());
    let path = store.path_for(test.name());
    let stored = store.read(test.name())?;

    match output_mode(cli) {
        OutputMode::Human => match &stored {
            Some(result) => {
                println!("{}  {}", colored_headline(result), test.name());
                println!("  file: {}", path.display());
                println!("{}", result.raw_detail);
            }
            None => println!(
                "{}  {} (no result file; last run did not complete)",
                "NONE".yellow(),
                test.name()
            ),
        },
        OutputMode::Json => {
            let payload = json!({
                "command": "show",
                "test": test.name(),
                "path": path.to_string_lossy(),
                "result": stored,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn run_list(cli: &Cli) -> Result<(), CliError> {
    let tests = registry();
    match output_mode(cli) {
        OutputMode::Human => {
            for test in &tests {
                println!(
                    "{:<32} expect {:<8} {}",
                    test.name(),
                    format!("{:?}", test.expectation()).to_lowercase(),
                    test.summary()
                );
            }
        }
        OutputMode::Json => {
            let items: Vec<Value> = tests
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name(),
                        "expectation": t.expectation(),
                        "summary": t.summary(),
                    })
                })
                .collect();
            write_json_line(&json!({ "command": "list", "tests": items }))?;
        }
    }
    Ok(())
}

fn run_config(cli: &Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let hash = config.stable_hash()?;
    match output_mode(cli) {
        OutputMode::Human => {
            let toml_str = toml::to_string_pretty(&config)
                .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
            println!("# config hash {hash}");
            println!("{toml_str}");
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "config",
                "hash": hash,
                "config": serde_json::to_value(&config)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn colored_headline(result: &TestResult) -> String {
    let headline = result.headline();
    match result.verdict {
        Verdict::Pass => headline.green().bold().to_string(),
        Verdict::Fail => headline.red().bold().to_string(),
    }
}

fn print_report_human(report: &RunReport) {
    println!("{}  {}", colored_headline(&report.result), report.test);
    println!("  result: {}", report.result_path.display());
    if !report.teardown.killed.is_empty() {
        println!("  teardown: force-killed {:?}", report.teardown.killed);
    }
    println!("  elapsed: {:.1}s", report.elapsed.as_secs_f64());
}

fn report_json(report: &RunReport) -> Value {
    json!({
        "command": "run",
        "test": report.test,
        "verdict": report.result.verdict,
        "status_code": report.result.status_code,
        "result_path": report.result_path.to_string_lossy(),
        "teardown": {
            "stop_code": report.teardown.stop_code,
            "killed": report.teardown.killed,
        },
        "elapsed_ms": u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
    })
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("PST_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}
