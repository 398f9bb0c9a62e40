use thiserror::Error;

/// Error patterns that indicate provider-side rate limiting.
const RATE_LIMIT_PATTERNS: &[&str] = &[
    "http 429",
    "status=429",
    "status 429",
    "status: 429",
    "too many requests",
    "rate limit",
    "rate_limit",
    "quota exceeded",
];

/// Whether an error message from the execution engine reads like a rate limit.
#[must_use]
pub fn is_rate_limit_message(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Failure reported by an [`crate::AgentExecutor`].
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Transient: the engine asked us to slow down.
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Permanent: credentials rejected or missing.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Permanent: network, protocol or payload failure.
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl ExecutionError {
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Classify a free-form error message: rate-limit text becomes
    /// [`Self::RateLimited`], everything else [`Self::Transport`].
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_rate_limit_message(&message) {
            Self::RateLimited { message }
        } else {
            Self::Transport { message }
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The caller broke the invocation contract (empty variant or messages).
    #[error("invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// A model-backed oracle answered with something we could not parse.
    #[error("malformed verdict: {0}")]
    MalformedVerdict(String),
}

impl Error {
    #[must_use]
    pub fn invalid_invocation(message: impl Into<String>) -> Self {
        Self::InvalidInvocation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("HTTP 429 Too Many Requests", true)]
    #[case("Rate limit reached for gpt-4o", true)]
    #[case("error code: rate_limit_exceeded", true)]
    #[case("You exceeded your current quota exceeded", true)]
    #[case("connection reset by peer", false)]
    #[case("invalid api key", false)]
    fn detects_rate_limit_text(#[case] msg: &str, #[case] expected: bool) {
        assert_eq!(is_rate_limit_message(msg), expected);
    }

    #[test]
    fn from_message_classifies() {
        assert!(ExecutionError::from_message("status 429").is_rate_limited());
        assert!(matches!(
            ExecutionError::from_message("dns failure"),
            ExecutionError::Transport { .. }
        ));
    }
}
