//! Process invocation seam: the real subprocess runner and a scripted runner
//! for deterministic tests.

#![allow(missing_docs)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;

use parking_lot::Mutex;

use crate::core::errors::{HarnessError, Result};

/// Captured output of one finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output carrying `stdout`.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs a program to completion and captures its output.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput>;
}

/// Blocking `std::process::Command` runner.
#[derive(Debug, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| HarnessError::CliInvocation {
                command: render_command(program, args),
                details: source.to_string(),
            })?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Shell-like rendering used in logs and error messages.
pub fn render_command(program: &Path, args: &[String]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl RecordedCall {
    /// Leading non-flag arguments, e.g. `["volume", "rename"]`.
    #[must_use]
    pub fn subcommand(&self) -> Vec<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .take_while(|a| !a.starts_with("--"))
            .collect()
    }
}

/// In-memory runner that replays queued replies keyed by subcommand and
/// records every call.
///
/// Subcommands with no queued reply answer with a success response.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    replies: Mutex<Vec<(String, VecDeque<ScriptedReply>)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

/// Reply queued on a [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Output(CommandOutput),
    /// The program could not be started.
    SpawnError(String),
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the subcommand, e.g. `"volume rename"`.
    pub fn push(&self, subcommand: &str, reply: ScriptedReply) {
        let mut replies = self.replies.lock();
        if let Some((_, queue)) = replies.iter_mut().find(|(key, _)| key == subcommand) {
            queue.push_back(reply);
        } else {
            replies.push((subcommand.to_string(), VecDeque::from([reply])));
        }
    }

    /// Queue a JSON response with the given status code.
    pub fn push_status(&self, subcommand: &str, code: i64, description: &str) {
        let body = serde_json::json!({
            "command": subcommand.replace(' ', "_").to_uppercase(),
            "result": {
                "status": { "code": code, "description": description },
                "data": {}
            }
        });
        self.push(
            subcommand,
            ScriptedReply::Output(CommandOutput::ok(body.to_string())),
        );
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls to the given subcommand.
    pub fn count(&self, subcommand: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.subcommand().join(" ") == subcommand)
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput> {
        let call = RecordedCall {
            program: program.to_path_buf(),
            args: args.to_vec(),
        };
        let key = call.subcommand().join(" ");
        self.calls.lock().push(call);

        let reply = self
            .replies
            .lock()
            .iter_mut()
            .find(|(k, _)| *k == key)
            .and_then(|(_, queue)| queue.pop_front());

        match reply {
            Some(ScriptedReply::Output(output)) => Ok(output),
            Some(ScriptedReply::SpawnError(details)) => Err(HarnessError::CliInvocation {
                command: render_command(program, args),
                details,
            }),
            None => Ok(CommandOutput::ok(
                serde_json::json!({
                    "command": key.replace(' ', "_").to_uppercase(),
                    "result": { "status": { "code": 0, "description": "DONE" } }
                })
                .to_string(),
            )),
        }
    }
}
