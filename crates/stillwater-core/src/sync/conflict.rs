//! Conflict detection and resolution

use std::time::Duration;

use super::error::SyncResultOf;
use super::remote::RemoteBackend;
use super::wire::fetch_remote;
use crate::config::default_conflict_fields;
use crate::models::{
    ConflictResolution, PerDomain, RecordStatus, ResolutionKind, ResolutionStrategy,
    SyncConflict, SyncableRecord,
};
use crate::util::now_millis;

/// Compares a pending local record with its remote copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDetector {
    watched: PerDomain<Vec<String>>,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new(default_conflict_fields())
    }
}

impl ConflictDetector {
    pub const fn new(watched: PerDomain<Vec<String>>) -> Self {
        Self { watched }
    }

    /// Look up the remote copy of `local` and compare.
    ///
    /// No remote copy means a first upload, never a conflict.
    pub async fn check_for_conflicts<R: RemoteBackend>(
        &self,
        remote: &R,
        local: &SyncableRecord,
        timeout: Duration,
    ) -> SyncResultOf<Option<SyncConflict>> {
        let remote_copy =
            fetch_remote(remote, local.domain(), local.user_id(), local.id(), timeout).await?;
        Ok(remote_copy.and_then(|remote_copy| self.detect(local, &remote_copy)))
    }

    /// Conflict between two copies of the same record, if they diverged.
    ///
    /// Both `version` and `last_modified` must differ, and at least one
    /// watched field must hold a different value.
    pub fn detect(&self, local: &SyncableRecord, remote: &SyncableRecord) -> Option<SyncConflict> {
        if local.version() == remote.version() || local.last_modified() == remote.last_modified() {
            return None;
        }

        let watched = self.watched.get(local.domain());
        let conflict_fields: Vec<String> = local
            .differing_fields(remote)?
            .into_iter()
            .filter(|field| watched.iter().any(|name| name == field))
            .map(ToString::to_string)
            .collect();
        if conflict_fields.is_empty() {
            return None;
        }

        Some(SyncConflict {
            id: local.id().to_string(),
            domain: local.domain(),
            local_data: local.clone(),
            remote_data: remote.clone(),
            conflict_fields,
            suggested_resolution: suggest(local, remote),
            detected_at: now_millis(),
        })
    }
}

/// Newer side wins; equal timestamps need a merge decision
fn suggest(local: &SyncableRecord, remote: &SyncableRecord) -> ConflictResolution {
    use std::cmp::Ordering;

    match local.last_modified().cmp(&remote.last_modified()) {
        Ordering::Greater => ConflictResolution::new(
            ResolutionKind::LocalWins,
            ResolutionStrategy::LatestTimestamp,
        ),
        Ordering::Less => ConflictResolution::new(
            ResolutionKind::RemoteWins,
            ResolutionStrategy::LatestTimestamp,
        ),
        Ordering::Equal => {
            ConflictResolution::new(ResolutionKind::Merge, ResolutionStrategy::UserChoice)
        }
    }
}

/// Produce the winning record for `conflict`, or `None` for a manual decision.
///
/// A merged record gets `version = max(local, remote) + 1` and is pending.
pub fn resolve_conflict(conflict: &SyncConflict, kind: ResolutionKind) -> Option<SyncableRecord> {
    match kind {
        ResolutionKind::LocalWins => Some(conflict.local_data.clone()),
        ResolutionKind::RemoteWins => Some(conflict.remote_data.clone()),
        ResolutionKind::Merge => {
            let local = &conflict.local_data;
            let remote = &conflict.remote_data;
            let mut merged = local.merge_with(remote)?;

            let meta = merged.meta_mut();
            meta.version = local.version().max(remote.version()) + 1;
            let newest = local.last_modified().max(remote.last_modified());
            meta.last_modified = now_millis().max(newest + 1);
            meta.created_at = local.meta().created_at.min(remote.meta().created_at);
            meta.sync_status = RecordStatus::Pending;
            Some(merged)
        }
        ResolutionKind::Manual => None,
    }
}
