//! Timestamp identifiers that order migrations.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

use crate::error::{Result, TidemarkError};

/// Canonical `strftime` layout of a migration identifier.
pub const ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Number of digits in the canonical form.
pub const ID_LEN: usize = 14;

/// A migration identifier, e.g. `20150118140555`.
///
/// Ordering follows the timestamp, which matches the lexicographic order of
/// the canonical string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MigrationId(NaiveDateTime);

impl MigrationId {
    /// Parse a 14-digit `YYYYMMDDHHMMSS` token.
    pub fn parse(token: &str) -> Result<Self> {
        if token.len() != ID_LEN || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TidemarkError::Parse(format!(
                "'{}' is not a {}-digit timestamp",
                token, ID_LEN
            )));
        }

        let parsed = NaiveDateTime::parse_from_str(token, ID_FORMAT).map_err(|e| {
            TidemarkError::Parse(format!("'{}' is not a valid timestamp: {}", token, e))
        })?;

        // chrono accepts `60` seconds as a leap second; the identifier does not.
        if parsed.nanosecond() >= 1_000_000_000 {
            return Err(TidemarkError::Parse(format!(
                "'{}' is not a valid timestamp: leap second",
                token
            )));
        }

        Ok(Self(parsed))
    }

    /// Parse the identifier from a migration file name such as
    /// `20150118140555_AddUsersTable.sql`.
    ///
    /// Only the text before the first `_` is considered.
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let prefix = file_name.split('_').next().unwrap_or(file_name);
        Self::parse(prefix)
    }

    /// Identifier for the given instant, truncated to whole seconds.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let naive = at.naive_utc();
        Self(naive.with_nanosecond(0).unwrap_or(naive))
    }

    /// Render the canonical 14-digit form.
    pub fn as_canonical(&self) -> String {
        self.0.format(ID_FORMAT).to_string()
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(ID_FORMAT))
    }
}
