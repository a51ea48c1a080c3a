//! Core types: errors, configuration, paths.

pub mod config;
pub mod errors;
pub mod paths;
