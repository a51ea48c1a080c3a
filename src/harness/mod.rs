//! System-test harness: fixture, scenarios, verdicts, and the run lifecycle.

pub mod context;
pub mod fixture;
pub mod lifecycle;
pub mod result;
pub mod scenario;
