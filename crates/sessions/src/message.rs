//! Message types stored in conversation JSONL files.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Who authored a message. Only these two roles are ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(Error::validation(
                "role",
                format!("expected user or assistant, got {other:?}"),
            )),
        }
    }
}

/// A single stored message. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch, assigned by the store.
    pub timestamp: u64,
}

impl Message {
    pub(crate) fn stamped(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_ms(),
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
    }

    #[test]
    fn role_rejects_system_and_case_variants() {
        assert!("system".parse::<Role>().unwrap_err().is_validation());
        assert!("User".parse::<Role>().unwrap_err().is_validation());
        assert!("".parse::<Role>().unwrap_err().is_validation());
    }

    #[test]
    fn message_serializes_with_lowercase_role() {
        let msg = Message {
            role: Role::Assistant,
            content: "hola".into(),
            timestamp: 12345,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hola");
        assert_eq!(json["timestamp"], 12345);
    }

    #[test]
    fn message_with_unknown_role_fails_to_deserialize() {
        let json = serde_json::json!({"role": "system", "content": "x", "timestamp": 1});
        assert!(serde_json::from_value::<Message>(json).is_err());
    }
}
