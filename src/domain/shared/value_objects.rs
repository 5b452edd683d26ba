//! Shared value objects used across the call-handling modules

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Call session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// E.164 phone number value object
///
/// A number is accepted only in E.164 form: a leading `+` followed by
/// digits, at least 11 and at most 16 characters in total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let number = raw.trim();

        if !number.starts_with('+') {
            return Err("number must start with '+'".to_string());
        }
        if number.len() < 11 {
            return Err("number is too short for E.164".to_string());
        }
        if number.len() > 16 {
            return Err("number is too long for E.164".to_string());
        }
        if !number[1..].chars().all(|c| c.is_ascii_digit()) {
            return Err("number may only contain digits after '+'".to_string());
        }

        Ok(Self(number.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
