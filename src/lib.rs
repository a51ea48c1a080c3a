#![forbid(unsafe_code)]

//! POS system tests (pst): end-to-end tests that drive a running storage array
//! through its command-line client and record a verdict per test.
//!
//! Each run follows the same linear shape:
//! 1. **Clear** the previous `<test-name>.result` sentinel
//! 2. **Fixture**: mount the array and create a baseline volume
//! 3. **Stimulus**: one CLI request whose reply is judged
//! 4. **Persist** `PASS|FAIL (<code>)` plus the raw reply
//! 5. **Teardown**: stop the array server
//!
//! # Library usage
//!
//! ```rust,no_run
//! use pos_system_tests::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use pos_system_tests::core::config::Config;
//! use pos_system_tests::harness::scenario::RenameVolumeSpecialChar;
//! ```

pub mod prelude;

pub mod array;
pub mod core;
pub mod harness;
pub mod logger;
