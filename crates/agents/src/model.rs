use {async_trait::async_trait, lexlinker_sessions::Message};

use crate::{error::ExecutionError, variant::AgentVariant};

/// Typed chat message handed to the execution engine.
///
/// Only carries what the model needs; store timestamps never reach a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content } => {
                content
            },
        }
    }

    /// Convert to OpenAI-compatible JSON format.
    #[must_use]
    pub fn to_openai_value(&self) -> serde_json::Value {
        serde_json::json!({ "role": self.role(), "content": self.content() })
    }
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        match msg.role {
            lexlinker_sessions::Role::User => Self::user(msg.content.clone()),
            lexlinker_sessions::Role::Assistant => Self::assistant(msg.content.clone()),
        }
    }
}

/// Build the model input for a turn: the system preamble followed by stored
/// history, oldest first.
#[must_use]
pub fn build_model_input(preamble: &str, history: &[Message]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(history.len() + 1);
    if !preamble.trim().is_empty() {
        out.push(ChatMessage::system(preamble));
    }
    out.extend(history.iter().map(ChatMessage::from));
    out
}

/// External language-model execution engine.
///
/// Implementations prepend the variant's instructions and pick its model;
/// they never retry on their own.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    fn id(&self) -> &str;

    async fn run(
        &self,
        variant: &AgentVariant,
        messages: &[ChatMessage],
    ) -> Result<String, ExecutionError>;
}
