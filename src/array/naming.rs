//! Volume naming policy enforced by the array.
//!
//! The harness never enforces this itself; it uses it to check that a
//! configured "invalid" rename target really is invalid, and to annotate logs.

#![allow(missing_docs)]

use std::sync::LazyLock;

use regex::Regex;

/// Shortest accepted volume name.
pub const MIN_NAME_LEN: usize = 2;
/// Longest accepted volume name.
pub const MAX_NAME_LEN: usize = 255;

static SPECIAL_CHAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_ \-]").unwrap_or_else(|e| panic!("static regex: {e}"))
});

/// Why a name is not accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameViolation {
    TooShort { len: usize },
    TooLong { len: usize },
    SpecialCharacter { ch: char },
    EdgeWhitespace,
}

impl std::fmt::Display for NameViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooShort { len } => write!(f, "length {len} is below {MIN_NAME_LEN}"),
            Self::TooLong { len } => write!(f, "length {len} exceeds {MAX_NAME_LEN}"),
            Self::SpecialCharacter { ch } => write!(f, "contains special character {ch:?}"),
            Self::EdgeWhitespace => write!(f, "starts or ends with a space"),
        }
    }
}

/// Check a volume name against the policy. Character rules take precedence
/// over length so that `"@"` reports the special character.
pub fn check_volume_name(name: &str) -> Result<(), NameViolation> {
    if let Some(ch) = first_special_char(name) {
        return Err(NameViolation::SpecialCharacter { ch });
    }
    let len = name.chars().count();
    if len < MIN_NAME_LEN {
        return Err(NameViolation::TooShort { len });
    }
    if len > MAX_NAME_LEN {
        return Err(NameViolation::TooLong { len });
    }
    if name.starts_with(' ') || name.ends_with(' ') {
        return Err(NameViolation::EdgeWhitespace);
    }
    Ok(())
}

/// First character outside `[A-Za-z0-9_ -]`, if any.
pub fn first_special_char(name: &str) -> Option<char> {
    SPECIAL_CHAR
        .find(name)
        .and_then(|m| m.as_str().chars().next())
}
