/// Config schema types (server, history, retry, outbound, provider, routing,
/// guardrails, twilio).
use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexlinkerConfig {
    pub server: ServerConfig,
    pub history: HistoryConfig,
    pub retry: RetryConfig,
    pub outbound: OutboundConfig,
    pub provider: ProviderConfig,
    pub routing: RoutingConfig,
    pub guardrails: GuardrailsConfig,
    pub twilio: TwilioConfig,
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0" so the carrier can reach the webhook.
    pub bind: String,
    pub port: u16,
    /// Mount `GET /debug/conversation/{identity}`.
    pub debug_routes: bool,
    /// Where conversation files live. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5001,
            debug_routes: false,
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Messages retained per conversation (`HISTORY_LIMIT`).
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total engine calls per turn (`MAX_RETRY_ATTEMPTS`).
    pub max_attempts: u32,
    /// First backoff delay, doubled before each later retry
    /// (`INITIAL_RETRY_DELAY_SECONDS`).
    pub initial_delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_seconds: 2,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Per-message character limit of the outbound transport (`OUTBOUND_CHUNK_LIMIT`).
    pub chunk_limit: usize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self { chunk_limit: 1500 }
    }
}

/// OpenAI-compatible execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    /// Model used by variants that do not name their own.
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// Deterministic keyword scoring; no engine call.
    #[default]
    Keyword,
    /// Ask the engine with the triage prompt.
    Model,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub classifier: ClassifierKind,
    /// Model for the triage call; falls back to `provider.model`.
    pub triage_model: Option<String>,
    /// Replaces the built-in system preamble.
    pub preamble: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailsConfig {
    /// Moderate inbound text with the engine.
    pub input: bool,
    /// Check outbound replies for a missing disclaimer.
    pub output: bool,
    pub model: Option<String>,
}

/// Twilio WhatsApp transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_token: Option<Secret<String>>,
    /// Sender number, with or without the `whatsapp:` prefix.
    pub phone_number: Option<String>,
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            phone_number: None,
            api_base: "https://api.twilio.com".into(),
        }
    }
}

impl TwilioConfig {
    /// Whether enough is set to send outbound messages.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.account_sid.as_deref().is_some_and(|s| !s.is_empty())
            && self
                .auth_token
                .as_ref()
                .is_some_and(|t| !t.expose_secret().is_empty())
            && self.phone_number.as_deref().is_some_and(|s| !s.is_empty())
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
