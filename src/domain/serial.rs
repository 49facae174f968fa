//! Unit serial numbers
//!
//! Format: exactly 13 ASCII digits (e.g. `1234567890123`). The serial is the
//! unit's primary identity and is never reassigned, even after a soft delete.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of digits in a serial number
pub const SERIAL_LEN: usize = 13;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerialError {
    #[error("Serial number must be exactly 13 digits, got '{0}'")]
    Invalid(String),
}

/// A validated 13-digit serial number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Returns the serial as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SerialNumber {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != SERIAL_LEN || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(SerialError::Invalid(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for SerialNumber {
    type Error = SerialError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SerialNumber> for String {
    fn from(serial: SerialNumber) -> Self {
        serial.0
    }
}
