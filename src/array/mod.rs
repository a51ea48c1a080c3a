//! Array-side plumbing: CLI client, response parsing, naming policy, and the
//! server process lifecycle.

pub mod cli;
pub mod command;
pub mod naming;
pub mod process;
pub mod response;
