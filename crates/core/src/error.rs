/// Result alias that carries the custom [`LipSyncError`] type.
pub type Result<T> = std::result::Result<T, LipSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LipSyncError {
    /// The cue document could not be decoded as the expected JSON shape.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// The cue document decoded but violates a track invariant, or a mesh is
    /// missing a morph channel the engine needs.
    #[error("validation error: {0}")]
    Validation(String),
    /// A cue or audio resource could not be fetched or decoded.
    #[error("resource error: {0}")]
    Resource(String),
    /// The audio backend refused to play.
    #[error("playback error: {0}")]
    Playback(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl LipSyncError {
    /// Creates a validation error from the provided message.
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a resource error from the provided message.
    pub fn resource<T: Into<String>>(msg: T) -> Self {
        Self::Resource(msg.into())
    }

    /// Creates a playback error from the provided message.
    pub fn playback<T: Into<String>>(msg: T) -> Self {
        Self::Playback(msg.into())
    }
}

impl From<reqwest::Error> for LipSyncError {
    fn from(value: reqwest::Error) -> Self {
        Self::Resource(value.to_string())
    }
}
