//! Typed wrapper over the array command-line client.
//!
//! Every request is issued with `--json-res` so the reply carries a status
//! block that [`crate::array::response`] can read.

use std::path::PathBuf;
use std::sync::Arc;

use crate::array::command::{CommandRunner, render_command};
use crate::array::response::{ResponseStatus, parse_status};
use crate::core::errors::{HarnessError, Result};

/// Raw reply of one CLI request. Owned by the caller until its status is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOutput {
    /// Subcommand that produced this reply, e.g. `volume rename`.
    pub command: &'static str,
    /// Full response text.
    pub raw: String,
}

impl CliOutput {
    /// Parse the status block.
    pub fn status(&self) -> Result<ResponseStatus> {
        parse_status(self.command, &self.raw)
    }
}

/// Array CLI client bound to one binary and one command runner.
#[derive(Clone)]
pub struct PosCli {
    binary: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for PosCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosCli")
            .field("binary", &self.binary)
            .finish_non_exhaustive()
    }
}

impl PosCli {
    pub fn new(binary: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    /// `volume rename`: the stimulus of the special-character test.
    pub fn rename_volume(&self, current: &str, new_name: &str, array: &str) -> Result<CliOutput> {
        self.send(
            "volume rename",
            &[
                "--volume-name",
                current,
                "--new-volume-name",
                new_name,
                "--array-name",
                array,
            ],
        )
    }

    pub fn create_volume(
        &self,
        name: &str,
        size: &str,
        max_iops: u64,
        max_bw: u64,
        array: &str,
    ) -> Result<CliOutput> {
        let iops = max_iops.to_string();
        let bw = max_bw.to_string();
        self.send(
            "volume create",
            &[
                "--volume-name",
                name,
                "--size",
                size,
                "--maxiops",
                iops.as_str(),
                "--maxbw",
                bw.as_str(),
                "--array-name",
                array,
            ],
        )
    }

    pub fn scan_devices(&self) -> Result<CliOutput> {
        self.send("device scan", &[])
    }

    /// Create a RAM-backed write buffer device.
    pub fn create_buffer_device(
        &self,
        name: &str,
        num_blocks: u64,
        block_size: u64,
    ) -> Result<CliOutput> {
        let blocks = num_blocks.to_string();
        let size = block_size.to_string();
        self.send(
            "device create",
            &[
                "--device-name",
                name,
                "--num-blocks",
                blocks.as_str(),
                "--block-size",
                size.as_str(),
                "--device-type",
                "uram",
            ],
        )
    }

    pub fn create_array(
        &self,
        array: &str,
        buffer: &str,
        data_devices: &[String],
        spare_devices: &[String],
        raid_type: &str,
    ) -> Result<CliOutput> {
        let data = data_devices.join(",");
        let spare = spare_devices.join(",");
        let mut args = vec![
            "--array-name",
            array,
            "--buffer",
            buffer,
            "--data-devs",
            data.as_str(),
        ];
        if !spare.is_empty() {
            args.extend(["--spare", spare.as_str()]);
        }
        args.extend(["--raid", raid_type]);
        self.send("array create", &args)
    }

    pub fn mount_array(&self, array: &str) -> Result<CliOutput> {
        self.send("array mount", &["--array-name", array])
    }

    pub fn system_info(&self) -> Result<CliOutput> {
        self.send("system info", &[])
    }

    /// Ask the array server to shut down without waiting for open volumes.
    pub fn stop_system(&self) -> Result<CliOutput> {
        self.send("system stop", &["--force"])
    }

    fn send(&self, command: &'static str, flags: &[&str]) -> Result<CliOutput> {
        let mut args: Vec<String> = command.split(' ').map(str::to_string).collect();
        args.extend(flags.iter().map(|f| (*f).to_string()));
        args.push("--json-res".to_string());

        let output = self.runner.run(&self.binary, &args)?;
        match output.exit_code {
            None => Err(HarnessError::CliInvocation {
                command: render_command(&self.binary, &args),
                details: "terminated by signal".to_string(),
            }),
            Some(code) if code != 0 && output.stdout.trim().is_empty() => {
                Err(HarnessError::CliInvocation {
                    command: render_command(&self.binary, &args),
                    details: format!("exit {code}: {}", output.stderr.trim()),
                })
            }
            Some(_) => Ok(CliOutput {
                command,
                raw: output.stdout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::command::{CommandOutput, ScriptedReply, ScriptedRunner};

    fn cli_with(runner: &Arc<ScriptedRunner>) -> PosCli {
        PosCli::new("/usr/local/bin/poseidonos-cli", runner.clone())
    }

    #[test]
    fn rename_emits_expected_argv() {
        let runner = Arc::new(ScriptedRunner::new());
        let cli = cli_with(&runner);
        cli.rename_volume("testVol1", "sp@cial", "POSArray").unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].args,
            vec![
                "volume",
                "rename",
                "--volume-name",
                "testVol1",
                "--new-volume-name",
                "sp@cial",
                "--array-name",
                "POSArray",
                "--json-res",
            ]
        );
        assert_eq!(
            calls[0].program,
            PathBuf::from("/usr/local/bin/poseidonos-cli")
        );
    }

    #[test]
    fn create_array_omits_spare_when_none() {
        let runner = Arc::new(ScriptedRunner::new());
        let cli = cli_with(&runner);
        cli.create_array(
            "POSArray",
            "uram0",
            &["d0".to_string(), "d1".to_string()],
            &[],
            "RAID10",
        )
        .unwrap();
        let calls = runner.calls();
        let args = &calls[0].args;
        assert!(args.iter().any(|a| a == "d0,d1"));
        assert!(!args.iter().any(|a| a == "--spare"));
        assert_eq!(args.last().map(String::as_str), Some("--json-res"));
    }

    #[test]
    fn output_status_is_parsed_lazily() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_status("volume rename", 2020, "invalid name");
        let out = cli_with(&runner)
            .rename_volume("testVol1", "sp@cial", "POSArray")
            .unwrap();
        assert_eq!(out.command, "volume rename");
        assert_eq!(out.status().unwrap().code, 2020);
    }

    #[test]
    fn nonzero_exit_with_json_body_is_returned() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(
            "volume rename",
            ScriptedReply::Output(CommandOutput {
                exit_code: Some(1),
                stdout: r#"{"result":{"status":{"code":2020}}}"#.to_string(),
                stderr: String::new(),
            }),
        );
        let out = cli_with(&runner)
            .rename_volume("a1", "b@", "POSArray")
            .unwrap();
        assert_eq!(out.status().unwrap().code, 2020);
    }

    #[test]
    fn nonzero_exit_without_body_is_invocation_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(
            "system info",
            ScriptedReply::Output(CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: "Could not connect to the CLI server.".to_string(),
            }),
        );
        let err = cli_with(&runner).system_info().unwrap_err();
        assert_eq!(err.code(), "PST-2001");
        assert!(err.to_string().contains("Could not connect"));
    }

    #[test]
    fn signal_termination_is_invocation_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.push(
            "system stop",
            ScriptedReply::Output(CommandOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
            }),
        );
        let err = cli_with(&runner).stop_system().unwrap_err();
        assert!(err.to_string().contains("terminated by signal"));
    }
}
