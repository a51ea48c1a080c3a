//! One run of a system test: clear → execute → judge → persist → teardown.
//!
//! A verdict of FAIL is a normal outcome. An error from execute or from parsing
//! the reply aborts the run before any result file exists, and the array is
//! left up for inspection unless `teardown.on_error` is set.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::array::process::TeardownReport;
use crate::core::errors::Result;
use crate::harness::context::TestContext;
use crate::harness::result::{TestResult, Verdict};
use crate::harness::scenario::SystemTest;
use crate::logger::jsonl::{EventType, LogEntry, Severity};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Test that ran.
    pub test: &'static str,
    /// Persisted verdict and evidence.
    pub result: TestResult,
    /// Result file that now holds `result`.
    pub result_path: PathBuf,
    /// What teardown had to do.
    pub teardown: TeardownReport,
    /// Wall time from clear to teardown.
    pub elapsed: Duration,
}

/// Run `test` once and persist its verdict.
pub fn run_test(test: &dyn SystemTest, ctx: &mut TestContext) -> Result<RunReport> {
    let started = Instant::now();
    let name = test.name();

    let config_hash = ctx.config.stable_hash()?;
    ctx.note(
        LogEntry::new(EventType::RunStart, Severity::Info)
            .test(name)
            .details(format!("config {config_hash}")),
    );

    // A stale file from an earlier run must never be mistaken for this one.
    ctx.store.clear(name)?;

    let persisted = judge_and_persist(test, ctx);
    let (result, result_path) = match persisted {
        Ok(done) => done,
        Err(err) => {
            ctx.note(
                LogEntry::new(EventType::RunAbort, Severity::Critical)
                    .test(name)
                    .error(&err),
            );
            if ctx.config.teardown.on_error
                && let Err(teardown_err) = ctx.lifecycle.teardown()
            {
                ctx.note(
                    LogEntry::new(EventType::Teardown, Severity::Critical)
                        .test(name)
                        .error(&teardown_err),
                );
            }
            return Err(err);
        }
    };

    let teardown = match ctx.lifecycle.teardown() {
        Ok(report) => report,
        Err(err) => {
            ctx.note(
                LogEntry::new(EventType::Teardown, Severity::Critical)
                    .test(name)
                    .error(&err),
            );
            return Err(err);
        }
    };
    ctx.note(
        LogEntry::new(EventType::Teardown, Severity::Info)
            .test(name)
            .details(format!(
                "stop_code={:?} killed={:?}",
                teardown.stop_code, teardown.killed
            )),
    );

    Ok(RunReport {
        test: name,
        result,
        result_path,
        teardown,
        elapsed: started.elapsed(),
    })
}

fn judge_and_persist(
    test: &dyn SystemTest,
    ctx: &mut TestContext,
) -> Result<(TestResult, PathBuf)> {
    let name = test.name();
    let reply = test.execute(ctx)?;
    let status = reply.status()?;
    ctx.note_response(name, reply.command, status.code, &status.description);

    let result = TestResult::judged(test.expectation(), status.code, reply.raw);
    let path = ctx.store.write(name, &result)?;

    let severity = match result.verdict {
        Verdict::Pass => Severity::Info,
        Verdict::Fail => Severity::Warning,
    };
    let mut entry = LogEntry::new(EventType::VerdictRecorded, severity)
        .test(name)
        .code(result.status_code);
    entry.verdict = Some(result.verdict);
    entry.path = Some(path.display().to_string());
    ctx.note(entry);

    Ok((result, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::command::{CommandOutput, ScriptedReply, ScriptedRunner};
    use crate::array::process::MockProcessControl;
    use crate::core::config::Config;
    use crate::harness::scenario::RenameVolumeSpecialChar;
    use crate::logger::jsonl::{JsonlConfig, JsonlWriter};
    use std::fs;
    use std::sync::Arc;

    const TEST: &str = "RENAME_VOL_SPECIAL_CHAR_ERROR";

    struct Rig {
        _dir: tempfile::TempDir,
        runner: Arc<ScriptedRunner>,
        ctx: TestContext,
        log_path: PathBuf,
    }

    fn rig(config: impl FnOnce(&mut Config)) -> Rig {
        rig_with(Arc::new(MockProcessControl::default()), config)
    }

    fn rig_with(control: Arc<MockProcessControl>, config: impl FnOnce(&mut Config)) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.paths.results_dir = dir.path().join("results");
        cfg.paths.jsonl_log = dir.path().join("activity.jsonl");
        cfg.array.poll_interval_ms = 1;
        cfg.teardown.stop_timeout_secs = 1;
        config(&mut cfg);

        let log_path = cfg.paths.jsonl_log.clone();
        let runner = Arc::new(ScriptedRunner::new());
        let log = JsonlWriter::open(JsonlConfig {
            fallback_path: None,
            ..JsonlConfig::from_paths(&cfg.paths)
        });
        let ctx = TestContext::new(cfg, runner.clone(), control, log);
        Rig {
            _dir: dir,
            runner,
            ctx,
            log_path,
        }
    }

    #[test]
    fn rejected_rename_records_pass_then_tears_down() {
        let mut rig = rig(|_| {});
        rig.runner
            .push_status("volume rename", 2020, "invalid volume name");

        let report = run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap();

        assert_eq!(report.result.verdict, Verdict::Pass);
        let body = fs::read_to_string(&report.result_path).unwrap();
        assert!(body.starts_with("PASS (2020)\n"));
        assert!(body.contains("invalid volume name"));
        assert_eq!(rig.runner.count("system stop"), 1);

        // Teardown comes after the rename.
        let steps: Vec<String> = rig
            .runner
            .calls()
            .iter()
            .map(|c| c.subcommand().join(" "))
            .collect();
        let rename_at = steps.iter().position(|s| s == "volume rename").unwrap();
        let stop_at = steps.iter().position(|s| s == "system stop").unwrap();
        assert!(rename_at < stop_at);
    }

    #[test]
    fn accepted_rename_records_fail_without_error() {
        let mut rig = rig(|_| {});
        rig.runner.push_status("volume rename", 0, "DONE");

        let report = run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap();

        assert_eq!(report.result.verdict, Verdict::Fail);
        let body = fs::read_to_string(&report.result_path).unwrap();
        assert!(body.starts_with("FAIL (0)\n"));
        assert_eq!(rig.runner.count("system stop"), 1);
    }

    #[test]
    fn rerun_leaves_single_fresh_result() {
        let mut rig = rig(|_| {});
        rig.runner.push_status("volume rename", 0, "DONE");
        rig.runner.push_status("volume rename", 2020, "invalid");

        run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap();
        let second = run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap();

        let results_dir = rig.ctx.config.paths.results_dir.clone();
        let files: Vec<_> = fs::read_dir(&results_dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(second.result_path, results_dir.join(format!("{TEST}.result")));
        assert!(
            fs::read_to_string(&second.result_path)
                .unwrap()
                .starts_with("PASS (2020)")
        );
    }

    #[test]
    fn malformed_reply_aborts_and_removes_stale_result() {
        let mut rig = rig(|_| {});
        rig.runner.push_status("volume rename", 0, "DONE");
        run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap();
        assert!(rig.ctx.store.read(TEST).unwrap().is_some());

        rig.runner.push(
            "volume rename",
            ScriptedReply::Output(CommandOutput::ok("Segmentation fault")),
        );
        let err = run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap_err();

        assert_eq!(err.code(), "PST-2002");
        assert_eq!(rig.ctx.store.read(TEST).unwrap(), None);
        // Only the first, completed run tore the array down.
        assert_eq!(rig.runner.count("system stop"), 1);
    }

    #[test]
    fn invocation_failure_propagates() {
        let mut rig = rig(|_| {});
        rig.runner.push(
            "volume rename",
            ScriptedReply::SpawnError("No such file or directory".to_string()),
        );
        let err = run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap_err();
        assert_eq!(err.code(), "PST-2001");
        assert_eq!(rig.ctx.store.read(TEST).unwrap(), None);
    }

    #[test]
    fn teardown_on_error_when_configured() {
        let mut rig = rig(|cfg| cfg.teardown.on_error = true);
        rig.runner.push_status("array mount", 1600, "mount failed");
        let err = run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap_err();
        assert_eq!(err.code(), "PST-2003");
        assert_eq!(rig.runner.count("system stop"), 1);
    }

    #[test]
    fn teardown_failure_keeps_recorded_result() {
        let control = Arc::new(MockProcessControl::with_running(&[4242]));
        control.survive_stop(&[4242]);
        let mut rig = rig_with(control.clone(), |cfg| cfg.teardown.force_kill = false);
        rig.runner.push_status("volume rename", 2020, "invalid");

        let err = run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap_err();

        assert_eq!(err.code(), "PST-2005");
        let stored = rig.ctx.store.read(TEST).unwrap().expect("result kept");
        assert_eq!(stored.headline(), "PASS (2020)");
        assert_eq!(rig.runner.count("system stop"), 1);
        assert!(control.killed().is_empty());
    }

    #[test]
    fn activity_log_traces_the_run() {
        let mut rig = rig(|_| {});
        rig.runner.push_status("volume rename", 2020, "invalid");
        run_test(&RenameVolumeSpecialChar, &mut rig.ctx).unwrap();

        let events: Vec<String> = fs::read_to_string(&rig.log_path)
            .unwrap()
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(events.first().map(String::as_str), Some("run_start"));
        assert_eq!(events.last().map(String::as_str), Some("teardown"));
        let verdict_at = events.iter().position(|e| e == "verdict_recorded").unwrap();
        assert_eq!(events[verdict_at + 1], "teardown");
    }
}
