use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("source unreadable: {0}")]
    SourceUnreadable(String),

    #[error("no video track found")]
    NoVideoTrack,

    #[error("no decoder available for codec: {0}")]
    UnsupportedCodec(String),

    #[error("decoder configure failed: {0}")]
    ConfigureFailed(String),

    #[error("decoder start failed: {0}")]
    StartFailed(String),

    #[error("seek failed: {0}")]
    SeekFailed(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MediaError>;
