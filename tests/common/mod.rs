#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_pst") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "pst.exe" } else { "pst" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve pst binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_env(case_name, args, &[])
}

pub fn run_cli_case_with_env(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let root = std::env::temp_dir().join("pst-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("PST_OUTPUT_FORMAT", "json")
        .env("RUST_BACKTRACE", "1");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("execute pst command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("env={env:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Stand-in for the array CLI: answers every subcommand with a JSON status
/// block and appends its argv to `calls.log`.
///
/// `FAKE_RENAME_CODE` sets the `volume rename` status code (default 2020),
/// `FAKE_FAIL_STEP` makes one subcommand (e.g. `array_mount`) return 1234,
/// and `FAKE_RENAME_GARBAGE=1` makes `volume rename` print non-JSON.
pub struct FakeArray {
    pub dir: tempfile::TempDir,
    pub cli: PathBuf,
    pub config: PathBuf,
    pub results: PathBuf,
    pub calls: PathBuf,
}

const FAKE_CLI: &str = r#"#!/bin/sh
here="$(dirname "$0")"
echo "$*" >> "$here/calls.log"
step="$1_$2"
code=0
desc="DONE"
if [ "$step" = "volume_rename" ]; then
  if [ "${FAKE_RENAME_GARBAGE:-0}" = "1" ]; then
    echo "Segmentation fault"
    exit 0
  fi
  code="${FAKE_RENAME_CODE:-2020}"
  if [ "$code" != "0" ]; then desc="volume name contains a special character"; fi
fi
if [ "$step" = "${FAKE_FAIL_STEP:-none}" ]; then
  code=1234
  desc="injected failure"
fi
printf '{"command":"%s","result":{"status":{"code":%s,"description":"%s"},"data":{}}}\n' "$step" "$code" "$desc"
"#;

impl FakeArray {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = dir.path().join("fake-cli.sh");
        fs::write(&cli, FAKE_CLI).expect("write fake cli");
        make_executable(&cli);

        let results = dir.path().join("results");
        let calls = dir.path().join("calls.log");
        let config = dir.path().join("pst.toml");
        let toml = format!(
            r#"[array]
name = "POSArray"
cli_binary = {cli:?}
process_name = "pst_fake_none"
launch = false
poll_interval_ms = 10

[volume]
name = "testVol1"

[rename]
invalid_name = "sp@cial"

[teardown]
stop_timeout_secs = 1

[paths]
results_dir = {results:?}
jsonl_log = {log:?}
"#,
            cli = cli.display().to_string(),
            results = results.display().to_string(),
            log = dir.path().join("activity.jsonl").display().to_string(),
        );
        fs::write(&config, toml).expect("write config");

        Self {
            dir,
            cli,
            config,
            results,
            calls,
        }
    }

    pub fn config_arg(&self) -> String {
        self.config.display().to_string()
    }

    pub fn result_file(&self, test: &str) -> PathBuf {
        self.results.join(format!("{test}.result"))
    }

    pub fn call_lines(&self) -> Vec<String> {
        fs::read_to_string(&self.calls)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn activity_log(&self) -> PathBuf {
        self.dir.path().join("activity.jsonl")
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).expect("stat fake cli").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod fake cli");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
