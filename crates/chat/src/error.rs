use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The detached pipeline task panicked or was aborted.
    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
