use secrecy::Secret;

pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Credentials and sender for one Twilio account.
#[derive(Debug, Clone)]
pub struct TwilioAccount {
    pub account_sid: String,
    pub auth_token: Secret<String>,
    /// Sender number, with or without the `whatsapp:` prefix.
    pub from: String,
    pub api_base: String,
}

impl TwilioAccount {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: Secret<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token,
            from: from.into(),
            api_base: TWILIO_API_BASE.to_string(),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// `POST` target for creating a message.
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

/// Address `number` on the WhatsApp channel, keeping an existing prefix.
#[must_use]
pub fn with_whatsapp_prefix(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{number}")
    }
}
