//! Status extraction from the array CLI's JSON responses.
//!
//! Only the status block is read. Newer clients emit it at
//! `result.status`; older ones wrap the whole document in `Response`.

use serde::Deserialize;
use serde_json::Value;

use crate::core::errors::{HarnessError, Result};

/// Status code the array uses for success.
pub const SUCCESS_CODE: i64 = 0;

/// Status block of one response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResponseStatus {
    /// Array event code; zero on success.
    pub code: i64,
    /// Human-readable description, when the array sends one.
    #[serde(default)]
    pub description: String,
}

impl ResponseStatus {
    /// Whether the array reported success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Parse the status block out of raw CLI output.
///
/// `command` names the request in errors. Surrounding whitespace is ignored;
/// anything else that is not a single JSON document is a parse failure.
pub fn parse_status(command: &str, raw: &str) -> Result<ResponseStatus> {
    let doc: Value = serde_json::from_str(raw.trim()).map_err(|e| HarnessError::ResponseParse {
        command: command.to_string(),
        details: e.to_string(),
    })?;

    let root = doc.get("Response").unwrap_or(&doc);
    let status = root
        .get("result")
        .and_then(|r| r.get("status"))
        .ok_or_else(|| HarnessError::ResponseParse {
            command: command.to_string(),
            details: "missing result.status".to_string(),
        })?;

    ResponseStatus::deserialize(status).map_err(|e| HarnessError::ResponseParse {
        command: command.to_string(),
        details: format!("result.status: {e}"),
    })
}
