//! Pass/fail oracles on inbound and outbound text.

use std::sync::Arc;

use {async_trait::async_trait, serde::Deserialize, tracing::debug};

use crate::{
    error::{Error, Result},
    model::{AgentExecutor, ChatMessage},
    prompt,
    variant::AgentVariant,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GuardrailVerdict {
    #[serde(rename = "tripwire")]
    pub tripwire_triggered: bool,
    #[serde(default)]
    pub reason: String,
}

impl GuardrailVerdict {
    #[must_use]
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn trip(reason: impl Into<String>) -> Self {
        Self {
            tripwire_triggered: true,
            reason: reason.into(),
        }
    }
}

/// Opaque content check. Callers treat errors as a pass.
#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, text: &str) -> Result<GuardrailVerdict>;
}

/// Always passes.
pub struct NoopGuardrail;

#[async_trait]
impl Guardrail for NoopGuardrail {
    fn name(&self) -> &str {
        "noop"
    }

    async fn check(&self, _text: &str) -> Result<GuardrailVerdict> {
        Ok(GuardrailVerdict::pass())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailKind {
    /// Inbound content moderation.
    Moderation,
    /// Outbound disclaimer check.
    Disclaimer,
}

/// Asks the execution engine for a JSON verdict.
pub struct ModelGuardrail {
    executor: Arc<dyn AgentExecutor>,
    kind: GuardrailKind,
    variant: AgentVariant,
}

impl ModelGuardrail {
    pub fn new(executor: Arc<dyn AgentExecutor>, kind: GuardrailKind, model: Option<String>) -> Self {
        let variant = match kind {
            GuardrailKind::Moderation => AgentVariant::new("content_moderation", "moderation")
                .with_instructions(prompt::MODERATION_INSTRUCTIONS),
            GuardrailKind::Disclaimer => AgentVariant::new("disclaimer_check", "moderation")
                .with_instructions(prompt::DISCLAIMER_CHECK_INSTRUCTIONS),
        }
        .with_model(model);
        Self {
            executor,
            kind,
            variant,
        }
    }
}

/// Pull the verdict object out of a model reply, tolerating code fences and
/// surrounding prose.
fn parse_verdict(raw: &str) -> Result<GuardrailVerdict> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => return Err(Error::MalformedVerdict(raw.chars().take(80).collect())),
    };
    serde_json::from_str(json).map_err(|e| Error::MalformedVerdict(e.to_string()))
}

#[async_trait]
impl Guardrail for ModelGuardrail {
    fn name(&self) -> &str {
        &self.variant.name
    }

    async fn check(&self, text: &str) -> Result<GuardrailVerdict> {
        let messages = [ChatMessage::user(text)];
        let raw = self.executor.run(&self.variant, &messages).await?;
        let verdict = parse_verdict(&raw)?;
        debug!(
            guardrail = ?self.kind,
            tripwire = verdict.tripwire_triggered,
            reason = %verdict.reason,
            "guardrail verdict"
        );
        Ok(verdict)
    }
}
