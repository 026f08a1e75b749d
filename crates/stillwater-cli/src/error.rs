use std::io;

use stillwater_core::sync::{SyncAbort, SyncError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] stillwater_core::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No journal content provided")]
    EmptyContent,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Set STILLWATER_REMOTE_URL and STILLWATER_REMOTE_KEY (a .env file works too)."
    )]
    SyncNotConfigured,
    #[error("Sync did not run: {0}")]
    SyncAborted(SyncAbort),
    #[error("Sync finished with {0} error(s)")]
    SyncIncomplete(usize),
}
