//! Verdicts and the one-file-per-test result store.
//!
//! A result file has a fixed two-part layout that downstream tooling greps:
//!
//! ```text
//! PASS (2020)
//! <raw response text>
//! ```

#![allow(missing_docs)]

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::array::response::SUCCESS_CODE;
use crate::core::errors::{HarnessError, Result};
use crate::core::paths::result_file_path;

/// Outcome of one test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The array behaved as the test expects.
    Pass,
    /// The array did not behave as expected.
    Fail,
}

impl Verdict {
    /// Label written to result files.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a test expects the array to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// PASS iff the status code denotes success.
    Success,
    /// PASS iff the status code denotes an error.
    Failure,
}

impl Expectation {
    /// Map a status code to a verdict.
    #[must_use]
    pub const fn judge(self, code: i64) -> Verdict {
        let succeeded = code == SUCCESS_CODE;
        match (self, succeeded) {
            (Self::Success, true) | (Self::Failure, false) => Verdict::Pass,
            (Self::Success, false) | (Self::Failure, true) => Verdict::Fail,
        }
    }
}

/// Verdict plus the evidence it was derived from. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub verdict: Verdict,
    pub status_code: i64,
    /// Full raw response text the verdict was derived from.
    pub raw_detail: String,
}

impl TestResult {
    /// Judge `status_code` under `expectation`.
    #[must_use]
    pub fn judged(expectation: Expectation, status_code: i64, raw_detail: String) -> Self {
        Self {
            verdict: expectation.judge(status_code),
            status_code,
            raw_detail,
        }
    }

    /// First line of the result file, e.g. `PASS (2020)`.
    #[must_use]
    pub fn headline(&self) -> String {
        format!("{} ({})", self.verdict, self.status_code)
    }

    /// Result file body.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}\n{}", self.headline(), self.raw_detail)
    }

    /// Parse a result file body written by [`Self::render`].
    pub fn parse(path: &Path, body: &str) -> Result<Self> {
        let malformed = |details: &str| HarnessError::Serialization {
            context: "result file",
            details: format!("{}: {details}", path.display()),
        };
        let (headline, raw_detail) = body.split_once('\n').unwrap_or((body, ""));
        let (label, rest) = headline
            .split_once(' ')
            .ok_or_else(|| malformed("missing status code"))?;
        let verdict = match label {
            "PASS" => Verdict::Pass,
            "FAIL" => Verdict::Fail,
            other => return Err(malformed(&format!("unknown verdict {other:?}"))),
        };
        let status_code = rest
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .and_then(|c| c.parse::<i64>().ok())
            .ok_or_else(|| malformed(&format!("bad status code {rest:?}")))?;
        Ok(Self {
            verdict,
            status_code,
            raw_detail: raw_detail.to_string(),
        })
    }
}

/// Directory of `<test-name>.result` sentinels.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sentinel path for `test_name`.
    #[must_use]
    pub fn path_for(&self, test_name: &str) -> PathBuf {
        result_file_path(&self.dir, test_name)
    }

    /// Remove a previous result. Absence is not an error.
    pub fn clear(&self, test_name: &str) -> Result<()> {
        let path = self.path_for(test_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(HarnessError::io(path, source)),
        }
    }

    /// Write `result` as the test's sentinel, replacing any previous one.
    pub fn write(&self, test_name: &str, result: &TestResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|source| HarnessError::io(&self.dir, source))?;
        let path = self.path_for(test_name);
        fs::write(&path, result.render()).map_err(|source| HarnessError::io(&path, source))?;
        Ok(path)
    }

    /// Read the stored result; `None` means the last run did not complete.
    pub fn read(&self, test_name: &str) -> Result<Option<TestResult>> {
        let path = self.path_for(test_name);
        match fs::read_to_string(&path) {
            Ok(body) => TestResult::parse(&path, &body).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(HarnessError::io(path, source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEST: &str = "RENAME_VOL_SPECIAL_CHAR_ERROR";

    #[test]
    fn failure_expectation_passes_on_error_code() {
        assert_eq!(Expectation::Failure.judge(2020), Verdict::Pass);
        assert_eq!(Expectation::Failure.judge(-1), Verdict::Pass);
        assert_eq!(Expectation::Failure.judge(0), Verdict::Fail);
    }

    #[test]
    fn success_expectation_passes_on_zero() {
        assert_eq!(Expectation::Success.judge(0), Verdict::Pass);
        assert_eq!(Expectation::Success.judge(1), Verdict::Fail);
    }

    #[test]
    fn render_uses_literal_layout() {
        let result = TestResult::judged(Expectation::Failure, 2020, "{\"x\":1}".to_string());
        assert_eq!(result.render(), "PASS (2020)\n{\"x\":1}");
        let accepted = TestResult::judged(Expectation::Failure, 0, "{}".to_string());
        assert_eq!(accepted.headline(), "FAIL (0)");
    }

    #[test]
    fn clear_is_silent_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        store.clear(TEST).unwrap();
        store.clear(TEST).unwrap();
    }

    #[test]
    fn write_replaces_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());
        store
            .write(TEST, &TestResult::judged(Expectation::Failure, 0, "old".to_string()))
            .unwrap();
        let path = store
            .write(
                TEST,
                &TestResult::judged(Expectation::Failure, 2020, "new".to_string()),
            )
            .unwrap();

        assert_eq!(path, dir.path().join(format!("{TEST}.result")));
        assert_eq!(fs::read_to_string(&path).unwrap(), "PASS (2020)\nnew");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn read_reports_absence_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("nested"));
        assert_eq!(store.read(TEST).unwrap(), None);

        let result = TestResult::judged(Expectation::Failure, 2020, "line1\nline2".to_string());
        store.write(TEST, &result).unwrap();
        assert_eq!(store.read(TEST).unwrap(), Some(result));

        store.clear(TEST).unwrap();
        assert_eq!(store.read(TEST).unwrap(), None);
    }

    #[test]
    fn malformed_file_is_serialization_error() {
        let err = TestResult::parse(Path::new("x.result"), "MAYBE (1)\n").unwrap_err();
        assert_eq!(err.code(), "PST-2101");
        let err = TestResult::parse(Path::new("x.result"), "PASS 1\n").unwrap_err();
        assert!(err.to_string().contains("bad status code"));
    }

    proptest! {
        #[test]
        fn failure_expectation_is_inverse_of_success(code in any::<i64>()) {
            prop_assert_ne!(Expectation::Failure.judge(code), Expectation::Success.judge(code));
        }

        #[test]
        fn rendered_result_reads_back(code in any::<i64>(), detail in "[ -~\n]{0,64}") {
            let result = TestResult::judged(Expectation::Failure, code, detail);
            let parsed = TestResult::parse(Path::new("p"), &result.render()).unwrap();
            prop_assert_eq!(parsed, result);
        }
    }
}
