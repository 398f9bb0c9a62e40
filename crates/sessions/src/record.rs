use std::{fs, io::ErrorKind, path::Path};

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    tracing::warn,
};

use crate::{ConversationIdentity, Message, Result};

/// Full view of one conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationRecord {
    pub identity: ConversationIdentity,
    pub conversation_history: Vec<Message>,
    pub current_agent_variant: Option<String>,
    pub metadata: Map<String, Value>,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Record fields persisted in the JSON sidecar next to the message log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct RecordMeta {
    #[serde(default)]
    pub current_agent_variant: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
}

impl RecordMeta {
    /// Load the sidecar. A missing file yields defaults; a corrupt one is
    /// replaced by defaults with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(data) => Ok(serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt record sidecar, resetting");
                Self::default()
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Bump `updated_at`, filling `created_at` on first touch.
    pub fn touch(&mut self, now: u64) {
        if self.created_at == 0 {
            self.created_at = now;
        }
        self.updated_at = now;
    }

    pub fn into_record(
        self,
        identity: ConversationIdentity,
        conversation_history: Vec<Message>,
    ) -> ConversationRecord {
        ConversationRecord {
            identity,
            conversation_history,
            current_agent_variant: self.current_agent_variant,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
