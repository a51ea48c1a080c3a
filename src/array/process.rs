//! Array server lifecycle: optional launch, readiness polling, and teardown.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::array::cli::PosCli;
use crate::core::config::{ArrayConfig, TeardownConfig};
use crate::core::errors::{HarnessError, Result};

/// Linux truncates `/proc/<pid>/comm` to this many bytes.
const COMM_MAX_LEN: usize = 15;

/// OS process control surface used by [`ArrayLifecycle`].
pub trait ProcessControl: Send + Sync {
    /// Start `binary` detached from the harness.
    fn spawn(&self, binary: &Path) -> Result<()>;
    /// Pids of live processes named `name`.
    fn pids(&self, name: &str) -> Vec<i32>;
    /// SIGKILL `pid`. A process that already exited is not an error.
    fn kill(&self, pid: i32) -> Result<()>;
}

/// `/proc` scan + `kill(2)` implementation.
#[derive(Debug, Default)]
pub struct OsProcessControl;

impl ProcessControl for OsProcessControl {
    fn spawn(&self, binary: &Path) -> Result<()> {
        Command::new(binary)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
            .map_err(|source| HarnessError::CliInvocation {
                command: binary.display().to_string(),
                details: source.to_string(),
            })
    }

    fn pids(&self, name: &str) -> Vec<i32> {
        let Ok(entries) = fs::read_dir("/proc") else {
            return Vec::new();
        };
        let wanted = truncate_comm(name);
        let mut pids: Vec<i32> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse::<i32>().ok())
            .filter(|pid| {
                fs::read_to_string(PathBuf::from(format!("/proc/{pid}/comm")))
                    .is_ok_and(|comm| comm.trim_end() == wanted)
            })
            .collect();
        pids.sort_unstable();
        pids
    }

    #[cfg(unix)]
    fn kill(&self, pid: i32) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(HarnessError::Io {
                path: PathBuf::from(format!("/proc/{pid}")),
                source: std::io::Error::from(errno),
            }),
        }
    }

    #[cfg(not(unix))]
    fn kill(&self, pid: i32) -> Result<()> {
        Err(HarnessError::Io {
            path: PathBuf::from(format!("pid:{pid}")),
            source: std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "process kill is only supported on unix",
            ),
        })
    }
}

fn truncate_comm(name: &str) -> &str {
    let mut end = name.len().min(COMM_MAX_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// In-memory process table for deterministic tests.
///
/// Processes listed in `survivors` ignore the graceful stop; the rest exit as
/// soon as a `system stop` has been observed through [`Self::stop_requested`].
#[derive(Debug, Default)]
pub struct MockProcessControl {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    running: Vec<i32>,
    survivors: Vec<i32>,
    immortal: bool,
    spawned: Vec<PathBuf>,
    killed: Vec<i32>,
}

impl MockProcessControl {
    #[must_use]
    pub fn with_running(pids: &[i32]) -> Self {
        let control = Self::default();
        control.state.lock().running = pids.to_vec();
        control
    }

    /// Mark pids that stay alive after a graceful stop.
    pub fn survive_stop(&self, pids: &[i32]) {
        self.state.lock().survivors = pids.to_vec();
    }

    /// Ignore SIGKILL as well (simulates a stuck process).
    pub fn make_immortal(&self) {
        self.state.lock().immortal = true;
    }

    /// Simulate the server exiting after a graceful stop.
    pub fn stop_requested(&self) {
        let mut state = self.state.lock();
        let survivors = state.survivors.clone();
        state.running.retain(|pid| survivors.contains(pid));
    }

    pub fn spawned(&self) -> Vec<PathBuf> {
        self.state.lock().spawned.clone()
    }

    pub fn killed(&self) -> Vec<i32> {
        self.state.lock().killed.clone()
    }
}

impl ProcessControl for MockProcessControl {
    fn spawn(&self, binary: &Path) -> Result<()> {
        let mut state = self.state.lock();
        state.spawned.push(binary.to_path_buf());
        let next = state.running.iter().max().map_or(1000, |p| p + 1);
        state.running.push(next);
        Ok(())
    }

    fn pids(&self, _name: &str) -> Vec<i32> {
        self.state.lock().running.clone()
    }

    fn kill(&self, pid: i32) -> Result<()> {
        let mut state = self.state.lock();
        state.killed.push(pid);
        if !state.immortal {
            state.running.retain(|p| *p != pid);
        }
        Ok(())
    }
}

/// What teardown did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Status code of `system stop`, when the server answered.
    pub stop_code: Option<i64>,
    /// Pids that needed SIGKILL after the graceful window.
    pub killed: Vec<i32>,
}

/// Starts, probes, and stops the array server.
pub struct ArrayLifecycle {
    cli: PosCli,
    control: Arc<dyn ProcessControl>,
    array: ArrayConfig,
    teardown: TeardownConfig,
}

impl std::fmt::Debug for ArrayLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayLifecycle")
            .field("cli", &self.cli)
            .field("process_name", &self.array.process_name)
            .finish_non_exhaustive()
    }
}

impl ArrayLifecycle {
    pub fn new(
        cli: PosCli,
        control: Arc<dyn ProcessControl>,
        array: ArrayConfig,
        teardown: TeardownConfig,
    ) -> Self {
        Self {
            cli,
            control,
            array,
            teardown,
        }
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.array.poll_interval_ms)
    }

    /// Launch the server when configured to and wait until it answers.
    ///
    /// With `launch = false` the server is assumed to be running already and
    /// nothing is probed; the first real request surfaces a dead server.
    pub fn ensure_running(&self) -> Result<()> {
        if !self.array.launch {
            return Ok(());
        }
        if self.control.pids(&self.array.process_name).is_empty() {
            self.control.spawn(&self.array.pos_binary)?;
        }
        self.wait_ready()
    }

    /// Poll `system info` until it reports success or the timeout elapses.
    pub fn wait_ready(&self) -> Result<()> {
        let timeout = Duration::from_secs(self.array.ready_timeout_secs);
        let started = Instant::now();
        let mut last_error;
        loop {
            match self.cli.system_info().and_then(|out| out.status()) {
                Ok(status) if status.is_success() => return Ok(()),
                Ok(status) => {
                    last_error = format!("system info returned code {}", status.code);
                }
                Err(err) => last_error = err.to_string(),
            }
            if started.elapsed() >= timeout {
                return Err(HarnessError::ArrayNotReady {
                    waited_secs: started.elapsed().as_secs(),
                    details: last_error,
                });
            }
            thread::sleep(self.poll_interval());
        }
    }

    /// Stop the server: graceful `system stop`, then SIGKILL whatever remains
    /// after `stop_timeout_secs` when `force_kill` is set.
    pub fn teardown(&self) -> Result<TeardownReport> {
        let mut report = TeardownReport::default();
        // A server that is already gone cannot answer; that is not a failure.
        if let Ok(out) = self.cli.stop_system() {
            report.stop_code = out.status().ok().map(|s| s.code);
        }

        let name = &self.array.process_name;
        // `None` means the deadline lies beyond what `Instant` can represent.
        let deadline = Instant::now().checked_add(Duration::from_secs(self.teardown.stop_timeout_secs));
        let mut remaining = self.control.pids(name);
        while !remaining.is_empty() && deadline.is_none_or(|d| Instant::now() < d) {
            thread::sleep(self.poll_interval());
            remaining = self.control.pids(name);
        }

        if remaining.is_empty() {
            return Ok(report);
        }
        if !self.teardown.force_kill {
            return Err(HarnessError::Teardown {
                process: name.clone(),
                pids: remaining,
            });
        }

        for pid in &remaining {
            self.control.kill(*pid)?;
        }
        report.killed = remaining;

        let survivors = self.control.pids(name);
        if survivors.is_empty() {
            Ok(report)
        } else {
            Err(HarnessError::Teardown {
                process: name.clone(),
                pids: survivors,
            })
        }
    }
}
