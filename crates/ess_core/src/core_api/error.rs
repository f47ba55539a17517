use thiserror::Error;

use crate::error::EssError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    Parse,
    Truncated,
    UnsupportedOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<EssError> for CoreError {
    fn from(e: EssError) -> Self {
        let code = match &e {
            EssError::Io(_) => CoreErrorCode::Io,
            EssError::Truncated { .. } | EssError::TruncatedWrite { .. } => CoreErrorCode::Truncated,
            _ => CoreErrorCode::Parse,
        };
        Self::new(code, e.to_string())
    }
}
