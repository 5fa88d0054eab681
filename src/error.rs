use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error details reported by the media engine adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    /// Engine-specific error code, when the engine provides one
    pub code: Option<i64>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Errors surfaced by the playback controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Engine failed to load media: {0}")]
    EngineLoad(ErrorInfo),
    #[error("Engine failed to seek to {target:?}: {info}")]
    EngineSeek { target: Duration, info: ErrorInfo },
    #[error("Engine failure: {0}")]
    EngineFatal(ErrorInfo),
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl PlaybackError {
    /// Whether playback can continue after this error without a new `load`
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PlaybackError::EngineSeek { .. } | PlaybackError::InvalidState { .. }
        )
    }
}
