//! Conversation identity normalization.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Transport prefixes stripped from raw addresses (matched case-insensitively).
const TRANSPORT_PREFIXES: &[&str] = &["whatsapp:", "messenger:", "sms:", "tel:"];

/// Canonical key for a conversation.
///
/// The only way to build one is [`ConversationIdentity::parse`], so every
/// store operation receives an already-normalized key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationIdentity(String);

impl ConversationIdentity {
    /// Normalize a raw sender/recipient address.
    ///
    /// Strips one leading transport prefix (`whatsapp:+52…` → `+52…`) and all
    /// whitespace. Fails when nothing is left.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut rest = raw.trim();
        for prefix in TRANSPORT_PREFIXES {
            if rest
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            {
                rest = &rest[prefix.len()..];
                break;
            }
        }

        let normalized: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
        if normalized.is_empty() {
            return Err(Error::validation("identity", "empty after normalization"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe, reversible encoding of the identity.
    ///
    /// ASCII alphanumerics and `+ - . @` pass through; every other byte
    /// (including `_`) becomes `_XX` with uppercase hex.
    pub fn file_stem(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'+' | b'-' | b'.' | b'@') {
                out.push(char::from(byte));
            } else {
                out.push_str(&format!("_{byte:02X}"));
            }
        }
        out
    }

    /// Inverse of [`Self::file_stem`]. Returns `None` for stems this crate
    /// did not produce.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let bytes = stem.as_bytes();
        let mut decoded = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'_' {
                let hex = stem.get(i + 1..i + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            } else {
                decoded.push(bytes[i]);
                i += 1;
            }
        }
        let text = String::from_utf8(decoded).ok()?;
        Self::parse(&text).ok()
    }
}

impl fmt::Display for ConversationIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConversationIdentity {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ConversationIdentity> for String {
    fn from(value: ConversationIdentity) -> Self {
        value.0
    }
}
