use {
    async_trait::async_trait,
    reqwest::StatusCode,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

use crate::{
    error::ExecutionError,
    model::{AgentExecutor, ChatMessage},
    variant::AgentVariant,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// OpenAI-compatible Chat Completions engine.
pub struct OpenAiExecutor {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    client: &'static reqwest::Client,
}

impl OpenAiExecutor {
    pub fn new(api_key: Secret<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: super::shared_http_client(),
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, variant: &AgentVariant, messages: &[ChatMessage]) -> serde_json::Value {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !variant.instructions.trim().is_empty() {
            wire.push(ChatMessage::system(variant.instructions.as_str()).to_openai_value());
        }
        wire.extend(messages.iter().map(ChatMessage::to_openai_value));
        serde_json::json!({
            "model": variant.model.as_deref().unwrap_or(&self.model),
            "messages": wire,
        })
    }
}

fn classify_status(status: StatusCode, body: &str) -> ExecutionError {
    let message = format!("HTTP {}: {}", status.as_u16(), body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => ExecutionError::rate_limited(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ExecutionError::auth(message),
        _ => ExecutionError::from_message(message),
    }
}

#[async_trait]
impl AgentExecutor for OpenAiExecutor {
    fn id(&self) -> &str {
        "openai"
    }

    async fn run(
        &self,
        variant: &AgentVariant,
        messages: &[ChatMessage],
    ) -> Result<String, ExecutionError> {
        let body = self.request_body(variant, messages);

        debug!(
            model = %body["model"],
            variant = %variant.name,
            messages_count = messages.len(),
            "openai complete request"
        );
        trace!(body = %body, "openai request body");

        let http_resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ExecutionError::from_message(e.to_string()))?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, variant = %variant.name, "openai API error");
            return Err(classify_status(status, &body_text));
        }

        let resp: serde_json::Value = http_resp
            .json()
            .await
            .map_err(|e| ExecutionError::transport(format!("unparsable response: {e}")))?;
        trace!(response = %resp, "openai raw response");

        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ExecutionError::transport("response has no message content"))
    }
}
