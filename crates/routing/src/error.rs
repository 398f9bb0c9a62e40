#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("classifier failed: {0}")]
    Classifier(#[from] lexlinker_agents::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
