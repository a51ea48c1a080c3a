//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::array::naming::{check_volume_name, first_special_char};
use crate::core::errors::{HarnessError, Result};
use crate::core::paths::resolve_absolute_path;

/// Upper bound for readiness and teardown waits (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Full harness configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub array: ArrayConfig,
    pub volume: VolumeConfig,
    pub rename: RenameConfig,
    pub teardown: TeardownConfig,
    pub paths: PathsConfig,
}

/// The array under test and the process that serves it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArrayConfig {
    /// Array name every volume command is scoped to.
    pub name: String,
    /// Command-line client used for every request.
    pub cli_binary: PathBuf,
    /// Array server binary, started by the fixture when `launch` is set.
    pub pos_binary: PathBuf,
    /// Process name matched during teardown.
    pub process_name: String,
    /// Start the array server before provisioning instead of assuming it runs.
    pub launch: bool,
    /// Write buffer device. Created through the CLI when `buffer_num_blocks > 0`.
    pub buffer: String,
    pub buffer_num_blocks: u64,
    pub buffer_block_size: u64,
    pub data_devices: Vec<String>,
    pub spare_devices: Vec<String>,
    pub raid_type: String,
    /// How long to wait for the server to answer `system info` after launch.
    pub ready_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

/// Baseline volume provisioned by the fixture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VolumeConfig {
    pub name: String,
    /// Size as the CLI accepts it, e.g. `10GB`.
    pub size: String,
    pub max_iops: u64,
    pub max_bw: u64,
}

/// Rename stimulus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenameConfig {
    /// Target name that must contain a character the array rejects.
    pub invalid_name: String,
}

/// Array shutdown behavior after a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TeardownConfig {
    pub stop_timeout_secs: u64,
    /// SIGKILL processes still alive after the graceful stop window.
    pub force_kill: bool,
    /// Also tear down when the run aborts on an infrastructure error.
    pub on_error: bool,
}

/// Filesystem paths used by the harness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    /// Directory holding one `<test-name>.result` file per test.
    pub results_dir: PathBuf,
    pub jsonl_log: PathBuf,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            name: "POSArray".to_string(),
            cli_binary: PathBuf::from("/usr/local/bin/poseidonos-cli"),
            pos_binary: PathBuf::from("/usr/local/bin/poseidonos"),
            process_name: "poseidonos".to_string(),
            launch: false,
            buffer: "uram0".to_string(),
            buffer_num_blocks: 8_388_608,
            buffer_block_size: 512,
            data_devices: vec![
                "unvme-ns-0".to_string(),
                "unvme-ns-1".to_string(),
                "unvme-ns-2".to_string(),
            ],
            spare_devices: vec!["unvme-ns-3".to_string()],
            raid_type: "RAID5".to_string(),
            ready_timeout_secs: 60,
            poll_interval_ms: 1_000,
        }
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            name: "testVol1".to_string(),
            size: "10GB".to_string(),
            max_iops: 0,
            max_bw: 0,
        }
    }
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            invalid_name: "sp@cial".to_string(),
        }
    }
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: 30,
            force_kill: true,
            on_error: false,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[PST-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("pst").join("config.toml");
        let data = home_dir.join(".local").join("share").join("pst");
        Self {
            config_file: cfg,
            results_dir: PathBuf::from("."),
            jsonl_log: data.join("activity.jsonl"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| HarnessError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(HarnessError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic FNV-1a hash of the effective config, recorded with each run.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PST_ARRAY_NAME") {
            self.array.name = raw;
        }
        if let Some(raw) = lookup("PST_CLI_BINARY") {
            self.array.cli_binary = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("PST_ARRAY_LAUNCH") {
            self.array.launch = parse_env_bool("PST_ARRAY_LAUNCH", &raw)?;
        }
        if let Some(raw) = lookup("PST_VOLUME_NAME") {
            self.volume.name = raw;
        }
        if let Some(raw) = lookup("PST_RENAME_INVALID_NAME") {
            self.rename.invalid_name = raw;
        }
        if let Some(raw) = lookup("PST_RESULTS_DIR") {
            self.paths.results_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("PST_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("PST_TEARDOWN_FORCE_KILL") {
            self.teardown.force_kill = parse_env_bool("PST_TEARDOWN_FORCE_KILL", &raw)?;
        }
        if let Some(raw) = lookup("PST_TEARDOWN_ON_ERROR") {
            self.teardown.on_error = parse_env_bool("PST_TEARDOWN_ON_ERROR", &raw)?;
        }
        if let Some(raw) = lookup("PST_TEARDOWN_STOP_TIMEOUT_SECS") {
            self.teardown.stop_timeout_secs =
                parse_env_u64("PST_TEARDOWN_STOP_TIMEOUT_SECS", &raw)?;
        }
        Ok(())
    }

    fn normalize_paths(&mut self) {
        self.paths.results_dir = resolve_absolute_path(&self.paths.results_dir);
        self.paths.jsonl_log = resolve_absolute_path(&self.paths.jsonl_log);
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("array.name", &self.array.name),
            ("array.process_name", &self.array.process_name),
            ("array.raid_type", &self.array.raid_type),
            ("volume.size", &self.volume.size),
        ] {
            if value.trim().is_empty() {
                return Err(HarnessError::InvalidConfig {
                    details: format!("{name} must not be empty"),
                });
            }
        }

        if self.array.data_devices.is_empty() {
            return Err(HarnessError::InvalidConfig {
                details: "array.data_devices must name at least one device".to_string(),
            });
        }

        if self.array.poll_interval_ms == 0 {
            return Err(HarnessError::InvalidConfig {
                details: "array.poll_interval_ms must be > 0".to_string(),
            });
        }
        if self.array.launch && self.array.ready_timeout_secs == 0 {
            return Err(HarnessError::InvalidConfig {
                details: "array.ready_timeout_secs must be > 0 when array.launch=true".to_string(),
            });
        }
        if self.teardown.stop_timeout_secs == 0 {
            return Err(HarnessError::InvalidConfig {
                details: "teardown.stop_timeout_secs must be > 0".to_string(),
            });
        }
        for (name, secs) in [
            ("array.ready_timeout_secs", self.array.ready_timeout_secs),
            ("teardown.stop_timeout_secs", self.teardown.stop_timeout_secs),
        ] {
            if secs > MAX_TIMEOUT_SECS {
                return Err(HarnessError::InvalidConfig {
                    details: format!("{name} must be <= {MAX_TIMEOUT_SECS}, got {secs}"),
                });
            }
        }

        if let Err(violation) = check_volume_name(&self.volume.name) {
            return Err(HarnessError::InvalidConfig {
                details: format!(
                    "volume.name {:?} must be a valid volume name: {violation}",
                    self.volume.name
                ),
            });
        }

        // A rename target the array would accept turns the negative test into a positive one.
        if first_special_char(&self.rename.invalid_name).is_none() {
            return Err(HarnessError::InvalidConfig {
                details: format!(
                    "rename.invalid_name {:?} must contain a special character",
                    self.rename.invalid_name
                ),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_u64(name: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|error| HarnessError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse::<bool>().map_err(|error| HarnessError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
