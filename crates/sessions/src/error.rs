use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any mutation (empty identity, unknown role, empty content).
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The backend could not be reached, or a write could not be verified.
    #[error("history store unavailable: {context}")]
    StoreUnavailable {
        context: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl Error {
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unavailable(context: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            context: context.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn unavailable_with(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StoreUnavailable {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::unavailable_with("i/o failure", source)
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::unavailable_with("encoding failure", source)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(source: tokio::task::JoinError) -> Self {
        Self::unavailable_with("blocking task failed", source)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
