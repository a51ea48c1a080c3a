//! PST-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Top-level error type for the system-test harness.
///
/// A verdict mismatch is never an error; it is recorded as FAIL. Every variant
/// here aborts the run before a result file is written.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("[PST-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[PST-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[PST-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[PST-2001] could not invoke `{command}`: {details}")]
    CliInvocation { command: String, details: String },

    #[error("[PST-2002] malformed response from `{command}`: {details}")]
    ResponseParse { command: String, details: String },

    #[error("[PST-2003] fixture step `{step}` failed with code {code}: {description}")]
    Fixture {
        step: &'static str,
        code: i64,
        description: String,
    },

    #[error("[PST-2004] array process not ready after {waited_secs}s: {details}")]
    ArrayNotReady { waited_secs: u64, details: String },

    #[error("[PST-2005] teardown left {process} running (pids {pids:?})")]
    Teardown { process: String, pids: Vec<i32> },

    #[error("[PST-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[PST-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[PST-3101] unknown test: {name}")]
    UnknownTest { name: String },
}

impl HarnessError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "PST-1001",
            Self::MissingConfig { .. } => "PST-1002",
            Self::ConfigParse { .. } => "PST-1003",
            Self::CliInvocation { .. } => "PST-2001",
            Self::ResponseParse { .. } => "PST-2002",
            Self::Fixture { .. } => "PST-2003",
            Self::ArrayNotReady { .. } => "PST-2004",
            Self::Teardown { .. } => "PST-2005",
            Self::Serialization { .. } => "PST-2101",
            Self::Io { .. } => "PST-3002",
            Self::UnknownTest { .. } => "PST-3101",
        }
    }

    /// Whether this is an environment failure raised while driving the array
    /// (fixture, invocation, or response parsing) rather than a harness bug.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::CliInvocation { .. }
                | Self::ResponseParse { .. }
                | Self::Fixture { .. }
                | Self::ArrayNotReady { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HarnessError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
