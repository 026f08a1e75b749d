//! Sync conflict model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{RecordDomain, SyncableRecord};
use crate::error::{Error, Result};

/// Which side of a conflict wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    LocalWins,
    RemoteWins,
    Merge,
    /// Leave the conflict queued for an explicit decision
    Manual,
}

impl ResolutionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalWins => "local_wins",
            Self::RemoteWins => "remote_wins",
            Self::Merge => "merge",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for ResolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local_wins" | "local" => Ok(Self::LocalWins),
            "remote_wins" | "remote" => Ok(Self::RemoteWins),
            "merge" => Ok(Self::Merge),
            "manual" => Ok(Self::Manual),
            other => Err(Error::unknown("resolution", other)),
        }
    }
}

/// How a resolution was (or should be) chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The newer `last_modified` decides
    LatestTimestamp,
    /// Someone picked the outcome explicitly
    UserChoice,
}

/// A resolution decision: the outcome plus the reason for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub kind: ResolutionKind,
    pub strategy: ResolutionStrategy,
}

impl ConflictResolution {
    pub const fn new(kind: ResolutionKind, strategy: ResolutionStrategy) -> Self {
        Self { kind, strategy }
    }

    /// Policy used by unattended passes: follow timestamps, local wins ties
    pub const fn background_default() -> Self {
        Self::new(ResolutionKind::LocalWins, ResolutionStrategy::LatestTimestamp)
    }

    /// Apply an explicit choice regardless of timestamps
    pub const fn user_choice(kind: ResolutionKind) -> Self {
        Self::new(kind, ResolutionStrategy::UserChoice)
    }

    /// Outcome to apply to `conflict` under this policy.
    ///
    /// `LatestTimestamp` follows the detector's suggestion and only falls
    /// back to `kind` when the timestamps tie; `UserChoice` applies `kind`.
    pub const fn effective_kind(&self, conflict: &SyncConflict) -> ResolutionKind {
        match self.strategy {
            ResolutionStrategy::UserChoice => self.kind,
            ResolutionStrategy::LatestTimestamp => match conflict.suggested_resolution.kind {
                ResolutionKind::Merge | ResolutionKind::Manual => self.kind,
                suggested => suggested,
            },
        }
    }
}

/// Local and remote copies of a record that diverged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Record id (conflicts are keyed by record)
    pub id: String,
    pub domain: RecordDomain,
    pub local_data: SyncableRecord,
    pub remote_data: SyncableRecord,
    /// Watched payload fields whose values differ
    pub conflict_fields: Vec<String>,
    pub suggested_resolution: ConflictResolution,
    /// Detection timestamp (Unix ms)
    pub detected_at: i64,
}
