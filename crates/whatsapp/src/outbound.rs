use {
    async_trait::async_trait,
    lexlinker_channels::{ChannelOutbound, Error, Result},
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::{debug, warn},
};

use crate::config::{TwilioAccount, with_whatsapp_prefix};

/// Non-2xx answer from the Messages API.
#[derive(Debug, thiserror::Error)]
#[error("HTTP {status}: {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: Option<i64>,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    sid: String,
}

/// Sends WhatsApp messages with the Twilio REST API.
pub struct TwilioOutbound {
    account: TwilioAccount,
    client: reqwest::Client,
}

impl TwilioOutbound {
    pub fn new(account: TwilioAccount) -> Self {
        Self::with_client(account, reqwest::Client::new())
    }

    pub fn with_client(account: TwilioAccount, client: reqwest::Client) -> Self {
        Self { account, client }
    }

    #[must_use]
    pub fn account(&self) -> &TwilioAccount {
        &self.account
    }
}

#[async_trait]
impl ChannelOutbound for TwilioOutbound {
    fn channel_type(&self) -> &str {
        "whatsapp"
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        if to.trim().is_empty() {
            return Err(Error::invalid_input("empty recipient"));
        }
        let to = with_whatsapp_prefix(to);
        let from = with_whatsapp_prefix(&self.account.from);
        let form = [
            ("From", from.as_str()),
            ("To", to.as_str()),
            ("Body", text),
        ];

        let resp = self
            .client
            .post(self.account.messages_url())
            .basic_auth(
                &self.account.account_sid,
                Some(self.account.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::external("twilio request", e))?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let body: ErrorBody = serde_json::from_str(&raw).unwrap_or_default();
            let err = ApiError {
                status: status.as_u16(),
                code: body.code,
                message: body.message.unwrap_or(raw),
            };
            warn!(status = err.status, code = ?err.code, to = %to, "twilio rejected message");
            return Err(Error::external("twilio send", err));
        }

        match resp.json::<CreatedMessage>().await {
            Ok(created) => debug!(sid = %created.sid, to = %to, "twilio message created"),
            Err(e) => debug!(error = %e, to = %to, "twilio accepted message without sid"),
        }
        Ok(())
    }
}
