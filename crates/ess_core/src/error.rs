use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EssError {
    #[error("format error: {0}")]
    Format(String),

    #[error("position desync after {region}: expected offset {expected}, stream at {actual}")]
    PositionDesync {
        region: &'static str,
        expected: u64,
        actual: u64,
    },

    #[error("{region} could not be read completely: {reason}")]
    Truncated { region: &'static str, reason: String },

    #[error("change form {refid} failed to decode: {reason}")]
    Decode { refid: String, reason: String },

    #[error("compression error: {0}")]
    Compression(String),

    #[error("refusing to write {file}: the save was truncated when it was read")]
    TruncatedWrite { file: String },

    #[error("containers differ: {0}")]
    Verify(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl EssError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Truncated { .. } | Self::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, EssError>;
