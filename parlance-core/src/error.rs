use thiserror::Error;

/// All errors produced by parlance-core.
#[derive(Debug, Error)]
pub enum ParlanceError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("audio decode error: {0}")]
    Decode(String),

    #[error("VAD error: {0}")]
    Vad(String),

    #[error("recognition error: {0}")]
    Recognition(String),

    #[error("audio sink error: {0}")]
    Sink(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ParlanceError>;
