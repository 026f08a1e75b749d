//! Storage and validation errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the local store, schema upgrades and record validation.
///
/// Remote and pass-level failures live in [`crate::sync::SyncError`], which
/// wraps this type as its `Storage` variant.
#[derive(Error, Debug)]
pub enum Error {
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// A stored body or setting could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record failed its range or required-field checks
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Text that does not name a known enum value
    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    /// The database was written by a newer build
    #[error("Database schema v{found} is newer than supported v{supported}")]
    SchemaTooNew { found: i64, supported: i64 },
}

impl Error {
    pub(crate) fn unknown(kind: &'static str, value: &str) -> Self {
        Self::UnknownValue {
            kind,
            value: value.to_string(),
        }
    }
}
