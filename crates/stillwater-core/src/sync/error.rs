//! Sync error taxonomy

use thiserror::Error;

/// Failures raised while moving records between the device and the backend
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Device is offline")]
    Offline,
    #[error("Remote request failed: {0}")]
    Network(String),
    #[error("Remote request timed out")]
    Timeout,
    #[error("Remote rejected record: {0}")]
    Validation(String),
    #[error("Local storage error: {0}")]
    Storage(#[from] crate::Error),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("A sync pass is already running")]
    InProgress,
    #[error("Sync pass was cancelled")]
    Cancelled,
    #[error("No pending conflict with id {0}")]
    ConflictNotFound(String),
    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),
}

pub type SyncResultOf<T> = Result<T, SyncError>;

impl SyncError {
    /// Whether another attempt at the same call might succeed
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidPayload(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_classification() {
        assert!(SyncError::Timeout.is_retriable());
        assert!(SyncError::Network("reset".to_string()).is_retriable());
        assert!(!SyncError::Validation("mood out of range".to_string()).is_retriable());
        assert!(!SyncError::Offline.is_retriable());
        assert!(!SyncError::Storage(crate::Error::InvalidRecord("x".to_string())).is_retriable());
    }
}
