//! Container ID validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CniError, CniResult};

/// A validated container ID.
///
/// Container IDs must:
/// - Be at least [`ContainerId::SHORT_LENGTH`] characters long
/// - Contain only ASCII alphanumerics, hyphens, underscores and periods
/// - Start with an alphanumeric character
///
/// Every interface and port name of an attachment is derived from
/// [`ContainerId::short`], so the same ID always maps to the same names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Number of leading characters used to derive resource names.
    pub const SHORT_LENGTH: usize = 12;

    /// Create a new container ID, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`CniError::InvalidContainerId`] if the ID format is invalid.
    pub fn new(id: impl Into<String>) -> CniResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the container ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 characters of the ID.
    #[must_use]
    pub fn short(&self) -> &str {
        // ASCII-only after validation, so byte slicing is on a char boundary.
        &self.0[..Self::SHORT_LENGTH]
    }

    fn validate(id: &str) -> CniResult<()> {
        let invalid = || CniError::InvalidContainerId { id: id.to_string() };

        if id.len() < Self::SHORT_LENGTH {
            return Err(invalid());
        }

        let mut chars = id.chars();
        if !chars.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')) {
            return Err(invalid());
        }

        Ok(())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = CniError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = CniError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
