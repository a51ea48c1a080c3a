//! Everything a system test needs, passed in explicitly.

#![allow(missing_docs)]

use std::sync::Arc;

use crate::array::cli::PosCli;
use crate::array::command::CommandRunner;
use crate::array::process::{ArrayLifecycle, ProcessControl};
use crate::core::config::Config;
use crate::harness::result::ResultStore;
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};

/// Configuration, array client, process lifecycle, result store, and
/// activity log for one run.
pub struct TestContext {
    pub config: Config,
    pub cli: PosCli,
    pub lifecycle: ArrayLifecycle,
    pub store: ResultStore,
    pub log: JsonlWriter,
    /// Echo progress to stderr.
    pub verbose: bool,
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("array", &self.config.array.name)
            .field("cli", &self.cli)
            .field("log", &self.log.state())
            .finish_non_exhaustive()
    }
}

impl TestContext {
    pub fn new(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        control: Arc<dyn ProcessControl>,
        log: JsonlWriter,
    ) -> Self {
        let cli = PosCli::new(config.array.cli_binary.clone(), runner);
        let lifecycle = ArrayLifecycle::new(
            cli.clone(),
            control,
            config.array.clone(),
            config.teardown.clone(),
        );
        let store = ResultStore::new(config.paths.results_dir.clone());
        Self {
            config,
            cli,
            lifecycle,
            store,
            log,
            verbose: false,
        }
    }

    /// Record a progress event and echo it when verbose.
    pub fn note(&mut self, entry: LogEntry) {
        if self.verbose {
            eprintln!(
                "[PST] {:?} {} {}",
                entry.event,
                entry.command.as_deref().unwrap_or(""),
                entry.details.as_deref().unwrap_or("")
            );
        }
        self.log.write_entry(&entry);
    }

    /// Log the status of a CLI reply under `test`.
    pub fn note_response(&mut self, test: &str, command: &str, code: i64, description: &str) {
        let severity = if code == 0 {
            Severity::Info
        } else {
            Severity::Warning
        };
        self.note(
            LogEntry::new(EventType::CliResponse, severity)
                .test(test)
                .command(command)
                .code(code)
                .details(description),
        );
    }
}
