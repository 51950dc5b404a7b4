use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Handles longer than this are not real accounts on the target site.
pub const MAX_HANDLE_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("account handle is empty")]
    Empty,

    #[error("account handle is {0} bytes, longer than the {MAX_HANDLE_LEN} byte limit")]
    TooLong(usize),

    #[error("account handle contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Normalized account identifier.
///
/// Every surface that refers to an account (cache rows, queue slots, wire
/// messages) goes through this type, so `"@alice"` and `"alice"` always
/// collapse to the same key. Handles are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AccountKey(String);

impl AccountKey {
    /// Normalize raw input into a key: trims whitespace, strips a single
    /// leading `@` marker, and validates the remaining handle.
    pub fn parse(input: &str) -> Result<Self, AccountError> {
        let trimmed = input.trim();
        let handle = trimmed.strip_prefix('@').unwrap_or(trimmed);

        if handle.is_empty() {
            return Err(AccountError::Empty);
        }
        if handle.len() > MAX_HANDLE_LEN {
            return Err(AccountError::TooLong(handle.len()));
        }
        if let Some(bad) = handle
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '.' && *c != '_')
        {
            return Err(AccountError::InvalidCharacter(bad));
        }

        Ok(Self(handle.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
