//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use pos_system_tests::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{HarnessError, Result};

// Array
pub use crate::array::cli::{CliOutput, PosCli};
pub use crate::array::command::{CommandRunner, SystemCommandRunner};
pub use crate::array::process::{ArrayLifecycle, OsProcessControl, ProcessControl};
pub use crate::array::response::{ResponseStatus, parse_status};

// Harness
pub use crate::harness::context::TestContext;
pub use crate::harness::fixture::{CreateBasicVolume, VolumeReference};
pub use crate::harness::lifecycle::{RunReport, run_test};
pub use crate::harness::result::{Expectation, ResultStore, TestResult, Verdict};
pub use crate::harness::scenario::{
    CreateVolumeBasic, RenameVolumeSpecialChar, SystemTest, find_test, registry,
};

// Logging
pub use crate::logger::jsonl::{JsonlConfig, JsonlWriter};
