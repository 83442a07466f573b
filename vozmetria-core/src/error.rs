use thiserror::Error;

/// All errors produced by vozmetria-core.
///
/// The per-tick analysis path never fails: undetected pitch, invalid ranges and
/// degenerate frames are expressed as values. Only lifecycle, configuration and
/// export operations return these.
#[derive(Debug, Error)]
pub enum VozError {
    #[error("a session is already being recorded")]
    SessionAlreadyActive,

    #[error("no session is being recorded")]
    NoActiveSession,

    #[error("session has not been finalized")]
    SessionNotFinalized,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("session export JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VozError>;
