//! Sync orchestrator.
//!
//! One [`SyncEngine`] drives passes for a device. A pass walks the three
//! record domains in priority order; per domain it uploads pending records
//! (detecting and resolving conflicts on the way), retries failed uploads
//! with backoff, then downloads remote changes made since the last pass.
//!
//! At most one pass runs at a time. The guard is a small state machine held
//! in a `watch` channel: `Idle -> Syncing -> (Cancelling) -> Idle`.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};

use super::conflict::{resolve_conflict, ConflictDetector};
use super::error::{SyncError, SyncResultOf};
use super::network::NetworkMonitor;
use super::optimizer::optimize;
use super::remote::RemoteBackend;
use super::retry::{RecordRef, RetryDecision, RetryQueue};
use super::wire::{download_remote, fetch_remote, upload_record};
use crate::config::EngineConfig;
use crate::db::LocalStore;
use crate::models::{
    BackgroundSyncConfig, BackgroundSyncConfigUpdate, ConflictResolution, PerDomain,
    RecordDomain, RecordStatus, ResolutionKind, SyncConflict, SyncPreferences, SyncStatus,
    SyncableRecord,
};
use crate::util::now_millis;

const CONFLICTS_KEY: &str = "sync_conflicts";

/// Progress milestones (start, end) for the first, second and third stage
const STAGE_MILESTONES: [(u8, u8); 3] = [(10, 40), (50, 70), (80, 90)];

fn config_key(user_id: &str) -> String {
    format!("background_sync_config.{user_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
    Cancelling,
}

/// Which part of a pass a progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Domain(RecordDomain),
    Complete,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(domain) => write!(f, "{domain}"),
            Self::Complete => f.write_str("complete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub stage: SyncStage,
    pub percentage: u8,
}

/// Per-pass options
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Cancel a running pass and take over instead of being rejected
    pub force: bool,
    /// Policy for detected conflicts; `None` queues them for manual resolution
    pub resolution: Option<ConflictResolution>,
    /// Receives `{stage, percentage}` milestones
    pub progress: Option<mpsc::UnboundedSender<SyncProgress>>,
}

impl SyncOptions {
    /// Options used by unattended passes
    pub fn background() -> Self {
        Self {
            resolution: Some(ConflictResolution::background_default()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<SyncProgress>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Why a pass stopped before finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAbort {
    InProgress,
    Offline,
    Cancelled,
    Storage,
}

impl fmt::Display for SyncAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "another sync is in progress",
            Self::Offline => "device is offline",
            Self::Cancelled => "sync was cancelled",
            Self::Storage => "local storage is unavailable",
        })
    }
}

/// Bytes moved during one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassUsage {
    pub uploaded_bytes: u64,
    pub downloaded_bytes: u64,
}

/// Aggregate outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// No record errors and not aborted
    pub success: bool,
    pub synced: PerDomain<usize>,
    /// Ids that failed terminally or were parked in the conflict queue
    pub failed: PerDomain<Vec<String>>,
    /// Pending records left for a later pass by the batch or size limits
    pub deferred: PerDomain<usize>,
    pub downloaded: PerDomain<usize>,
    pub errors: Vec<String>,
    pub data_usage: PassUsage,
    pub duration: Duration,
    pub aborted: Option<SyncAbort>,
}

impl SyncResult {
    fn aborted(reason: SyncAbort, duration: Duration) -> Self {
        Self {
            aborted: Some(reason),
            duration,
            ..Self::default()
        }
    }
}

/// Resets the phase to `Idle` when a pass ends, however it ends
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<SyncPhase>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(SyncPhase::Idle);
    }
}

/// Outcome of one successful attempt at a record
enum Attempt {
    /// Remote and local copies now match
    Synced { uploaded_bytes: u64 },
    /// Conflict queued for a manual decision
    Parked,
    /// Uploaded, but a newer local edit landed meanwhile and stays pending
    Superseded { uploaded_bytes: u64 },
}

/// Mutable state of a running pass
struct Pass<'a> {
    user_id: &'a str,
    resolution: Option<ConflictResolution>,
    since: i64,
    batch_limit: usize,
    skip_large: bool,
    retry: RetryQueue,
    result: SyncResult,
}

fn report(
    progress: Option<&mpsc::UnboundedSender<SyncProgress>>,
    stage: SyncStage,
    percentage: u8,
) {
    if let Some(progress) = progress {
        progress.send(SyncProgress { stage, percentage }).ok();
    }
}

pub struct SyncEngine<S, R, N> {
    store: S,
    remote: R,
    network: N,
    config: EngineConfig,
    detector: ConflictDetector,
    phase: watch::Sender<SyncPhase>,
    conflict_lock: Mutex<()>,
}

impl<S: LocalStore, R: RemoteBackend, N: NetworkMonitor> SyncEngine<S, R, N> {
    pub fn new(store: S, remote: R, network: N, config: EngineConfig) -> Self {
        let detector = ConflictDetector::new(config.conflict_fields.clone());
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            store,
            remote,
            network,
            config,
            detector,
            phase,
            conflict_lock: Mutex::new(()),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn network(&self) -> &N {
        &self.network
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Ask the running pass to stop; returns whether one was running
    pub fn cancel(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == SyncPhase::Syncing {
                *phase = SyncPhase::Cancelling;
                true
            } else {
                false
            }
        })
    }

    fn is_cancelled(&self) -> bool {
        self.phase() == SyncPhase::Cancelling
    }

    fn try_begin(&self) -> Option<PhaseGuard<'_>> {
        let acquired = self.phase.send_if_modified(|phase| {
            if *phase == SyncPhase::Idle {
                *phase = SyncPhase::Syncing;
                true
            } else {
                false
            }
        });
        acquired.then(|| PhaseGuard { phase: &self.phase })
    }

    async fn begin(&self, force: bool) -> Result<PhaseGuard<'_>, SyncAbort> {
        if let Some(guard) = self.try_begin() {
            return Ok(guard);
        }
        if !force {
            return Err(SyncAbort::InProgress);
        }

        tracing::info!("Forced sync: cancelling the running pass");
        let mut phase = self.phase.subscribe();
        loop {
            self.cancel();
            if phase
                .wait_for(|phase| *phase == SyncPhase::Idle)
                .await
                .is_err()
            {
                return Err(SyncAbort::InProgress);
            }
            if let Some(guard) = self.try_begin() {
                return Ok(guard);
            }
        }
    }

    /// Sleep for `duration`, waking early if the pass is cancelled
    async fn pause(&self, duration: Duration) {
        let mut phase = self.phase.subscribe();
        tokio::select! {
            () = tokio::time::sleep(duration) => {}
            _ = phase.wait_for(|phase| *phase == SyncPhase::Cancelling) => {}
        }
    }

    /// Run one pass for `user_id`.
    ///
    /// A call made while another pass runs is rejected with
    /// [`SyncAbort::InProgress`] and changes nothing, unless `options.force`
    /// is set.
    pub async fn sync_all_data(&self, user_id: &str, options: SyncOptions) -> SyncResult {
        let started = Instant::now();
        let guard = match self.begin(options.force).await {
            Ok(guard) => guard,
            Err(reason) => {
                tracing::info!("Sync for {user_id} rejected: {reason}");
                return SyncResult::aborted(reason, started.elapsed());
            }
        };

        let result = self.run_pass(user_id, &options, started).await;
        drop(guard);
        result
    }

    /// Forced pass under the background conflict policy.
    ///
    /// Takes over from a running pass. Use [`Self::sync_all_data`] with
    /// `resolution: None` to queue conflicts for manual resolution instead.
    pub async fn force_sync_now(
        &self,
        user_id: &str,
        progress: Option<mpsc::UnboundedSender<SyncProgress>>,
    ) -> SyncResult {
        let options = SyncOptions {
            force: true,
            resolution: Some(ConflictResolution::background_default()),
            progress,
        };
        self.sync_all_data(user_id, options).await
    }

    async fn run_pass(&self, user_id: &str, options: &SyncOptions, started: Instant) -> SyncResult {
        let started_at = now_millis();
        let network = self.network.current();
        if !network.connected {
            tracing::warn!("Sync for {user_id} skipped: device is offline");
            return SyncResult::aborted(SyncAbort::Offline, started.elapsed());
        }

        let (config, previous) = match self.load_pass_inputs(user_id).await {
            Ok(inputs) => inputs,
            Err(error) => {
                tracing::warn!("Sync for {user_id} aborted: {error}");
                let mut result = SyncResult::aborted(SyncAbort::Storage, started.elapsed());
                result.errors.push(error.to_string());
                return result;
            }
        };

        let usage_today = previous.data_usage.for_day(started_at);
        let plan = optimize(
            &network,
            &usage_today,
            self.config.daily_data_cap_bytes,
            &config,
        );
        tracing::info!(
            "Starting sync for {user_id} on {} (batch {}, skip large payloads: {})",
            network.class,
            plan.batch_size,
            plan.skip_large_files
        );

        let mut pass = Pass {
            user_id,
            resolution: options.resolution,
            since: previous.last_sync_at.unwrap_or(0),
            batch_limit: plan.batch_size.min(config.batch_size).max(1),
            skip_large: plan.skip_large_files,
            retry: RetryQueue::new(
                self.config.retry_base_delay,
                config.max_retries,
                config.exponential_backoff,
            ),
            result: SyncResult::default(),
        };

        for (index, domain) in plan.priority.iter().copied().enumerate() {
            let (start, end) = STAGE_MILESTONES.get(index).copied().unwrap_or((90, 90));
            report(options.progress.as_ref(), SyncStage::Domain(domain), start);

            if self.sync_domain(&mut pass, domain).await.is_err() {
                tracing::info!("Sync for {user_id} cancelled during {domain}");
                let mut result = pass.result;
                result.success = false;
                result.aborted = Some(SyncAbort::Cancelled);
                result.duration = started.elapsed();
                return result;
            }

            report(options.progress.as_ref(), SyncStage::Domain(domain), end);
        }

        let mut result = pass.result;
        if let Err(error) = self
            .persist_status(user_id, started_at, &config, usage_today, &result)
            .await
        {
            result.errors.push(format!("sync status: {error}"));
        }
        result.success = result.errors.is_empty();
        result.duration = started.elapsed();
        report(options.progress.as_ref(), SyncStage::Complete, 100);

        tracing::info!(
            "Sync for {user_id} finished: {} uploaded, {} failed, {} downloaded, {} deferred in {:?}",
            result.synced.total(),
            result.failed.sessions.len() + result.failed.moods.len() + result.failed.journals.len(),
            result.downloaded.total(),
            result.deferred.total(),
            result.duration
        );
        result
    }

    async fn load_pass_inputs(
        &self,
        user_id: &str,
    ) -> SyncResultOf<(BackgroundSyncConfig, SyncStatus)> {
        let config = self.get_background_sync_config(user_id).await?;
        let previous = self
            .store
            .get_sync_status(user_id)
            .await?
            .unwrap_or_else(|| SyncStatus::new(user_id));
        Ok((config, previous))
    }

    /// Upload, retry and download one domain. Errs only when cancelled.
    async fn sync_domain(&self, pass: &mut Pass<'_>, domain: RecordDomain) -> SyncResultOf<()> {
        let pending = match self.store.get_pending(pass.user_id, domain).await {
            Ok(pending) => pending,
            Err(error) => {
                pass.result.errors.push(format!("{domain}: {error}"));
                Vec::new()
            }
        };

        let mut selected = 0;
        for record in pending {
            if self.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let too_large = pass.skip_large
                && record.estimated_size() > self.config.large_payload_threshold;
            if too_large || selected >= pass.batch_limit {
                *pass.result.deferred.get_mut(domain) += 1;
                continue;
            }
            selected += 1;

            let outcome = self.attempt(&record, pass.resolution).await;
            self.settle(pass, &record, outcome).await;
        }

        self.drain_retries(pass, domain).await?;
        if self.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        match download_remote(
            &self.store,
            &self.remote,
            domain,
            pass.user_id,
            pass.since,
            self.config.download_page_size,
            self.config.request_timeout,
        )
        .await
        {
            Ok(outcome) => {
                *pass.result.downloaded.get_mut(domain) += outcome.applied;
                pass.result.data_usage.downloaded_bytes += outcome.bytes;
                pass.result.errors.extend(outcome.errors);
            }
            Err(error) => {
                tracing::warn!("Download of {domain} failed: {error}");
                pass.result.errors.push(format!("{domain} download: {error}"));
            }
        }

        Ok(())
    }

    /// Retry queued records of `domain` as they become due
    async fn drain_retries(&self, pass: &mut Pass<'_>, domain: RecordDomain) -> SyncResultOf<()> {
        while let Some(entry) = pass.retry.next_for(domain).cloned() {
            let wait_ms = entry.next_retry_at.saturating_sub(now_millis());
            if wait_ms > 0 {
                self.pause(Duration::from_millis(wait_ms.unsigned_abs()))
                    .await;
            }
            if self.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let record = match self.store.get(domain, &entry.record_ref.id).await {
                Ok(Some(record)) if record.sync_status() != RecordStatus::Synced => record,
                Ok(_) => {
                    pass.retry.remove(&entry.record_ref);
                    continue;
                }
                Err(error) => {
                    pass.retry.remove(&entry.record_ref);
                    pass.result.failed.get_mut(domain).push(entry.record_ref.id.clone());
                    pass.result
                        .errors
                        .push(format!("{domain} {}: {error}", entry.record_ref.id));
                    continue;
                }
            };

            tracing::debug!(
                "Retrying {domain} {} (attempt {})",
                record.id(),
                entry.retry_count + 1
            );
            let outcome = self.attempt(&record, pass.resolution).await;
            self.settle(pass, &record, outcome).await;
        }
        Ok(())
    }

    /// Fold one attempt into the pass result and retry queue
    async fn settle(
        &self,
        pass: &mut Pass<'_>,
        record: &SyncableRecord,
        outcome: SyncResultOf<Attempt>,
    ) {
        let domain = record.domain();
        let record_ref = RecordRef::new(domain, record.id());

        match outcome {
            Ok(Attempt::Synced { uploaded_bytes }) => {
                pass.retry.remove(&record_ref);
                *pass.result.synced.get_mut(domain) += 1;
                pass.result.data_usage.uploaded_bytes += uploaded_bytes;
            }
            Ok(Attempt::Parked) => {
                pass.retry.remove(&record_ref);
                pass.result.failed.get_mut(domain).push(record.id().to_string());
            }
            Ok(Attempt::Superseded { uploaded_bytes }) => {
                pass.retry.remove(&record_ref);
                *pass.result.deferred.get_mut(domain) += 1;
                pass.result.data_usage.uploaded_bytes += uploaded_bytes;
            }
            Err(error) if error.is_retriable() => {
                match pass.retry.record_failure(record_ref, error.to_string(), now_millis()) {
                    RetryDecision::Scheduled(entry) => {
                        tracing::warn!(
                            "{domain} {} failed (attempt {}): {error}; retrying at {}",
                            record.id(),
                            entry.retry_count,
                            entry.next_retry_at
                        );
                    }
                    RetryDecision::Exhausted(entry) => {
                        tracing::warn!(
                            "{domain} {} gave up after {} attempts: {error}",
                            record.id(),
                            entry.retry_count
                        );
                        pass.result.failed.get_mut(domain).push(record.id().to_string());
                        pass.result.errors.push(format!(
                            "{domain} {}: {} (after {} attempts)",
                            record.id(),
                            entry.last_error,
                            entry.retry_count
                        ));
                    }
                }
            }
            Err(error) => {
                pass.retry.remove(&record_ref);
                if matches!(error, SyncError::Validation(_)) {
                    if let Err(store_error) = self
                        .store
                        .set_status_if_version(
                            domain,
                            record.id(),
                            record.version(),
                            RecordStatus::Failed,
                        )
                        .await
                    {
                        pass.result
                            .errors
                            .push(format!("{domain} {}: {store_error}", record.id()));
                    }
                }
                tracing::warn!("{domain} {} failed: {error}", record.id());
                pass.result.failed.get_mut(domain).push(record.id().to_string());
                pass.result
                    .errors
                    .push(format!("{domain} {}: {error}", record.id()));
            }
        }
    }

    /// Detect, resolve and upload one pending record
    async fn attempt(
        &self,
        record: &SyncableRecord,
        resolution: Option<ConflictResolution>,
    ) -> SyncResultOf<Attempt> {
        let timeout = self.config.request_timeout;
        let conflict = self
            .detector
            .check_for_conflicts(&self.remote, record, timeout)
            .await?;

        let Some(conflict) = conflict else {
            let uploaded_bytes = upload_record(&self.remote, record, timeout).await?;
            if !self
                .store
                .mark_synced(record.domain(), record.id(), record.version())
                .await?
            {
                tracing::warn!(
                    "{} {} changed during upload; left pending",
                    record.domain(),
                    record.id()
                );
                return Ok(Attempt::Superseded { uploaded_bytes });
            }
            tracing::debug!(
                "Uploaded {} {} v{}",
                record.domain(),
                record.id(),
                record.version()
            );
            return Ok(Attempt::Synced { uploaded_bytes });
        };

        let kind = resolution.map_or(ResolutionKind::Manual, |policy| {
            policy.effective_kind(&conflict)
        });
        tracing::warn!(
            "Conflict on {} {} ({}), applying {kind}",
            conflict.domain,
            conflict.id,
            conflict.conflict_fields.join(", ")
        );
        self.apply_resolution(&conflict, kind).await
    }

    /// Make the chosen outcome of `conflict` the state on both sides
    async fn apply_resolution(
        &self,
        conflict: &SyncConflict,
        kind: ResolutionKind,
    ) -> SyncResultOf<Attempt> {
        let local = &conflict.local_data;
        let remote = &conflict.remote_data;

        let Some(mut winner) = resolve_conflict(conflict, kind) else {
            self.enqueue_conflict(conflict).await?;
            self.store
                .set_status_if_version(
                    conflict.domain,
                    &conflict.id,
                    local.version(),
                    RecordStatus::Failed,
                )
                .await?;
            return Ok(Attempt::Parked);
        };

        // The winner must outrank the copy it replaces; adopting the remote
        // copy as is needs no upload.
        let replaced = if kind == ResolutionKind::RemoteWins {
            local
        } else {
            remote
        };
        let mut needs_upload = kind != ResolutionKind::RemoteWins;
        if winner.version() <= replaced.version() {
            let newest = local.last_modified().max(remote.last_modified());
            let meta = winner.meta_mut();
            meta.version = local.version().max(remote.version()) + 1;
            meta.last_modified = now_millis().max(newest + 1);
            needs_upload = true;
        }

        let uploaded_bytes = if needs_upload {
            upload_record(&self.remote, &winner, self.config.request_timeout).await?
        } else {
            0
        };

        let winner = winner.with_status(RecordStatus::Synced);
        if !self.store.replace_if_version(&winner, local.version()).await? {
            tracing::warn!(
                "{} {} changed while resolving a conflict; local edit kept",
                conflict.domain,
                conflict.id
            );
        }
        self.remove_conflict(conflict.domain, &conflict.id).await?;
        Ok(Attempt::Synced { uploaded_bytes })
    }

    /// Conflicts waiting for a manual decision
    pub async fn get_conflicts(&self) -> SyncResultOf<Vec<SyncConflict>> {
        let Some(raw) = self.store.get_setting(CONFLICTS_KEY).await? else {
            return Ok(Vec::new());
        };
        let conflicts = serde_json::from_str(&raw).map_err(crate::Error::from)?;
        Ok(conflicts)
    }

    async fn save_conflicts(&self, conflicts: &[SyncConflict]) -> SyncResultOf<()> {
        let raw = serde_json::to_string(conflicts).map_err(crate::Error::from)?;
        self.store.set_setting(CONFLICTS_KEY, &raw).await?;
        Ok(())
    }

    async fn enqueue_conflict(&self, conflict: &SyncConflict) -> SyncResultOf<()> {
        let _lock = self.conflict_lock.lock().await;
        let mut conflicts = self.get_conflicts().await?;
        conflicts.retain(|queued| queued.domain != conflict.domain || queued.id != conflict.id);
        conflicts.push(conflict.clone());
        self.save_conflicts(&conflicts).await
    }

    async fn remove_conflict(&self, domain: RecordDomain, id: &str) -> SyncResultOf<()> {
        let _lock = self.conflict_lock.lock().await;
        let mut conflicts = self.get_conflicts().await?;
        let before = conflicts.len();
        conflicts.retain(|queued| queued.domain != domain || queued.id != id);
        if conflicts.len() != before {
            self.save_conflicts(&conflicts).await?;
        }
        Ok(())
    }

    /// Apply an explicit decision to a queued conflict.
    ///
    /// Both copies are re-read first so edits made since detection are not
    /// lost. Requires connectivity and fails while a pass is running.
    pub async fn resolve_manual_conflict(
        &self,
        conflict_id: &str,
        kind: ResolutionKind,
    ) -> SyncResultOf<()> {
        if kind == ResolutionKind::Manual {
            return Err(SyncError::InvalidResolution(
                "choose local_wins, remote_wins or merge".to_string(),
            ));
        }

        let mut conflict = self
            .get_conflicts()
            .await?
            .into_iter()
            .find(|conflict| conflict.id == conflict_id)
            .ok_or_else(|| SyncError::ConflictNotFound(conflict_id.to_string()))?;

        if !self.network.current().connected {
            return Err(SyncError::Offline);
        }
        let _guard = self.try_begin().ok_or(SyncError::InProgress)?;

        if let Some(current) = self.store.get(conflict.domain, &conflict.id).await? {
            conflict.local_data = current;
        }
        if let Some(current) = fetch_remote(
            &self.remote,
            conflict.domain,
            conflict.local_data.user_id(),
            &conflict.id,
            self.config.request_timeout,
        )
        .await?
        {
            conflict.remote_data = current;
        }

        tracing::info!(
            "Resolving conflict on {} {} with {kind}",
            conflict.domain,
            conflict.id
        );
        self.apply_resolution(&conflict, kind).await.map(|_| ())
    }

    /// Locally pending records per domain
    pub async fn get_pending_sync_count(&self, user_id: &str) -> SyncResultOf<PerDomain<usize>> {
        let mut counts = PerDomain::default();
        for domain in RecordDomain::ALL {
            *counts.get_mut(domain) = self.store.get_pending(user_id, domain).await?.len();
        }
        Ok(counts)
    }

    /// Last stored status snapshot, or a blank one before the first pass
    pub async fn get_sync_status(&self, user_id: &str) -> SyncResultOf<SyncStatus> {
        Ok(self
            .store
            .get_sync_status(user_id)
            .await?
            .unwrap_or_else(|| SyncStatus::new(user_id)))
    }

    /// Background config of `user_id`, created with defaults on first use
    pub async fn get_background_sync_config(
        &self,
        user_id: &str,
    ) -> SyncResultOf<BackgroundSyncConfig> {
        if let Some(raw) = self.store.get_setting(&config_key(user_id)).await? {
            let config = serde_json::from_str(&raw).map_err(crate::Error::from)?;
            return Ok(config);
        }

        let config = BackgroundSyncConfig::default();
        self.save_background_sync_config(user_id, &config).await?;
        Ok(config)
    }

    /// Apply a partial update and mirror it into the status preferences
    pub async fn update_background_sync_config(
        &self,
        user_id: &str,
        update: &BackgroundSyncConfigUpdate,
    ) -> SyncResultOf<BackgroundSyncConfig> {
        let mut config = self.get_background_sync_config(user_id).await?;
        config.apply(update);
        self.save_background_sync_config(user_id, &config).await?;

        if let Some(mut status) = self.store.get_sync_status(user_id).await? {
            status.sync_preferences = SyncPreferences::from(&config);
            self.store.set_sync_status(&status).await?;
        }
        Ok(config)
    }

    async fn save_background_sync_config(
        &self,
        user_id: &str,
        config: &BackgroundSyncConfig,
    ) -> SyncResultOf<()> {
        let raw = serde_json::to_string(config).map_err(crate::Error::from)?;
        self.store.set_setting(&config_key(user_id), &raw).await?;
        Ok(())
    }

    async fn persist_status(
        &self,
        user_id: &str,
        started_at: i64,
        config: &BackgroundSyncConfig,
        usage_today: crate::models::DataUsage,
        result: &SyncResult,
    ) -> SyncResultOf<()> {
        let status = SyncStatus {
            user_id: user_id.to_string(),
            last_sync_at: Some(started_at),
            pending_counts: self.get_pending_sync_count(user_id).await?,
            failed_sync: result.failed.clone(),
            data_usage: usage_today.add(
                result.data_usage.uploaded_bytes,
                result.data_usage.downloaded_bytes,
            ),
            sync_preferences: SyncPreferences::from(config),
        };
        self.store.set_sync_status(&status).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlRecordStore};
    use crate::models::{JournalEntry, MoodEntry, SessionProgress};
    use crate::sync::memory::{InjectedFailure, MemoryRemoteBackend};
    use crate::sync::network::{NetworkClass, NetworkState, StaticNetworkMonitor};
    use crate::sync::wire::to_wire;
    use pretty_assertions::assert_eq;

    const USER: &str = "user-1";
    const T1: i64 = 1_700_000_000_000;
    const T2: i64 = 1_700_000_060_000;
    const T3: i64 = 1_700_000_120_000;

    type TestEngine<'a> =
        SyncEngine<LibSqlRecordStore<'a>, MemoryRemoteBackend, StaticNetworkMonitor>;

    fn test_config() -> EngineConfig {
        EngineConfig {
            retry_base_delay: Duration::from_millis(5),
            request_timeout: Duration::from_secs(5),
            ..EngineConfig::default()
        }
    }

    fn engine_with(db: &Database, config: EngineConfig, class: NetworkClass) -> TestEngine<'_> {
        SyncEngine::new(
            LibSqlRecordStore::new(db.connection()),
            MemoryRemoteBackend::new(),
            StaticNetworkMonitor::new(NetworkState::online(class)),
            config,
        )
    }

    fn engine(db: &Database) -> TestEngine<'_> {
        engine_with(db, test_config(), NetworkClass::Wifi)
    }

    async fn save(engine: &TestEngine<'_>, record: impl Into<SyncableRecord>) -> SyncableRecord {
        let record = record.into();
        engine.store().save(&record).await.unwrap();
        record
    }

    async fn stored(engine: &TestEngine<'_>, record: &SyncableRecord) -> SyncableRecord {
        engine
            .store()
            .get(record.domain(), record.id())
            .await
            .unwrap()
            .unwrap()
    }

    /// Forced pass that queues every conflict
    async fn manual_pass(engine: &TestEngine<'_>) -> SyncResult {
        let options = SyncOptions {
            force: true,
            ..SyncOptions::default()
        };
        engine.sync_all_data(USER, options).await
    }

    /// Local journal v2 at T2 and a diverged remote v1 at T1
    async fn seed_journal_conflict(engine: &TestEngine<'_>) -> SyncableRecord {
        let mut local = JournalEntry::new(USER, "Evening", "Long sit, steady breath");
        local.meta.version = 2;
        local.meta.last_modified = T2;
        let mut remote = local.clone();
        remote.meta.version = 1;
        remote.meta.last_modified = T1;
        remote.content = "Short sit".to_string();

        engine
            .remote()
            .insert_row("journal_entries", to_wire(&remote.into()).unwrap());
        save(engine, local).await
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_upload_without_remote_copy() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let mood = save(&engine, MoodEntry::new(USER, 6, 5, 4)).await;

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.synced.moods, 1);
        assert_eq!(result.synced.total(), 1);
        assert_eq!(stored(&engine, &mood).await.sync_status(), RecordStatus::Synced);
        assert_eq!(engine.remote().row_count("mood_entries"), 1);

        let status = engine.get_sync_status(USER).await.unwrap();
        assert!(status.last_sync_at.is_some());
        assert_eq!(status.pending_counts.total(), 0);
        assert_eq!(
            status.data_usage.uploaded_bytes,
            result.data_usage.uploaded_bytes
        );
        assert!(result.data_usage.uploaded_bytes > 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn progress_reports_fixed_milestones() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = engine
            .sync_all_data(USER, SyncOptions::background().with_progress(tx))
            .await;
        assert!(result.success);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let percentages: Vec<u8> = events.iter().map(|event| event.percentage).collect();
        assert_eq!(percentages, vec![10, 40, 50, 70, 80, 90, 100]);
        assert_eq!(events[0].stage, SyncStage::Domain(RecordDomain::Sessions));
        assert_eq!(events[6].stage, SyncStage::Complete);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn newer_local_copy_wins_and_is_uploaded() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let local = seed_journal_conflict(&engine).await;

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.synced.journals, 1);
        let row = engine.remote().row("journal_entries", local.id()).unwrap();
        assert_eq!(row["content"], "Long sit, steady breath");
        assert_eq!(row["version"], 2);
        assert_eq!(
            stored(&engine, &local).await,
            local.clone().with_status(RecordStatus::Synced)
        );
        assert!(engine.get_conflicts().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn newer_remote_copy_replaces_local_without_upload() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);

        let mut local = SessionProgress::new(USER, "body-scan", 600);
        local.meta.last_modified = T1;
        let mut remote = local.clone();
        remote.meta.version = 2;
        remote.meta.last_modified = T3;
        remote.notes = "Finished on the train".to_string();
        let remote = SyncableRecord::from(remote);
        engine
            .remote()
            .insert_row("session_progress", to_wire(&remote).unwrap());
        let local = save(&engine, local).await;

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.synced.sessions, 1);
        assert_eq!(engine.remote().upsert_calls(), 0);
        assert_eq!(
            stored(&engine, &local).await,
            remote.with_status(RecordStatus::Synced)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn conflicts_without_policy_are_queued() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let local = seed_journal_conflict(&engine).await;

        let result = manual_pass(&engine).await;

        assert_eq!(result.failed.journals, vec![local.id().to_string()]);
        assert_eq!(engine.remote().upsert_calls(), 0);
        assert_eq!(stored(&engine, &local).await.sync_status(), RecordStatus::Failed);

        let conflicts = engine.get_conflicts().await.unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, local.id());
        assert_eq!(conflicts[0].conflict_fields, vec!["content"]);

        // A second pass re-detects the same conflict without duplicating it
        manual_pass(&engine).await;
        assert_eq!(engine.get_conflicts().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn manual_merge_resolves_queued_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let local = seed_journal_conflict(&engine).await;
        manual_pass(&engine).await;

        engine
            .resolve_manual_conflict(local.id(), ResolutionKind::Merge)
            .await
            .unwrap();

        let merged = stored(&engine, &local).await;
        assert_eq!(merged.version(), 3);
        assert_eq!(merged.sync_status(), RecordStatus::Synced);
        let row = engine.remote().row("journal_entries", local.id()).unwrap();
        assert_eq!(row["version"], 3);
        assert!(engine.get_conflicts().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn manual_resolution_rejects_bad_requests() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let local = seed_journal_conflict(&engine).await;
        manual_pass(&engine).await;

        assert!(matches!(
            engine
                .resolve_manual_conflict(local.id(), ResolutionKind::Manual)
                .await,
            Err(SyncError::InvalidResolution(_))
        ));
        assert!(matches!(
            engine
                .resolve_manual_conflict("missing", ResolutionKind::LocalWins)
                .await,
            Err(SyncError::ConflictNotFound(_))
        ));

        engine.network().set(NetworkState::offline());
        assert!(matches!(
            engine
                .resolve_manual_conflict(local.id(), ResolutionKind::LocalWins)
                .await,
            Err(SyncError::Offline)
        ));
        assert_eq!(engine.get_conflicts().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn timeouts_exhaust_retry_budget() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let mood = save(&engine, MoodEntry::new(USER, 6, 5, 4)).await;
        engine
            .remote()
            .fail_next_upserts(3, InjectedFailure::Timeout);

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(!result.success);
        assert_eq!(result.failed.moods, vec![mood.id().to_string()]);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(engine.remote().upsert_calls(), 3);
        assert_eq!(stored(&engine, &mood).await.sync_status(), RecordStatus::Pending);

        let status = engine.get_sync_status(USER).await.unwrap();
        assert_eq!(status.failed_sync.moods, vec![mood.id().to_string()]);
        assert_eq!(status.pending_counts.moods, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transient_failure_is_retried_within_the_pass() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let mood = save(&engine, MoodEntry::new(USER, 6, 5, 4)).await;
        engine
            .remote()
            .fail_next_upserts(1, InjectedFailure::Network);
        engine
            .remote()
            .fail_next_lookups(1, InjectedFailure::Timeout);

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.synced.moods, 1);
        assert_eq!(engine.remote().upsert_calls(), 2);
        assert_eq!(stored(&engine, &mood).await.sync_status(), RecordStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_backend_times_out() {
        let db = Database::open_in_memory().await.unwrap();
        let config = EngineConfig {
            request_timeout: Duration::from_millis(20),
            ..test_config()
        };
        let engine = engine_with(&db, config, NetworkClass::Wifi);
        let mood = save(&engine, MoodEntry::new(USER, 6, 5, 4)).await;
        engine.remote().set_latency(Duration::from_millis(200));

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(!result.success);
        assert_eq!(result.failed.moods, vec![mood.id().to_string()]);
        assert!(result.errors.iter().any(|error| error.contains("timed out")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn validation_failure_is_terminal() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let mood = save(&engine, MoodEntry::new(USER, 6, 5, 4)).await;
        engine
            .remote()
            .fail_next_upserts(1, InjectedFailure::Validation);

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(!result.success);
        assert_eq!(engine.remote().upsert_calls(), 1);
        assert_eq!(result.failed.moods, vec![mood.id().to_string()]);
        assert_eq!(stored(&engine, &mood).await.sync_status(), RecordStatus::Failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_pass_aborts_before_any_change() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let mood = save(&engine, MoodEntry::new(USER, 6, 5, 4)).await;
        engine.network().set(NetworkState::offline());

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert_eq!(result.aborted, Some(SyncAbort::Offline));
        assert!(!result.success);
        assert_eq!(engine.remote().upsert_calls(), 0);
        assert_eq!(stored(&engine, &mood).await.sync_status(), RecordStatus::Pending);
        assert!(engine.store().get_sync_status(USER).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_pass_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        save(&engine, MoodEntry::new(USER, 6, 5, 4)).await;
        engine.remote().set_latency(Duration::from_millis(100));

        let (first, second) = tokio::join!(
            engine.sync_all_data(USER, SyncOptions::background()),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                engine.sync_all_data(USER, SyncOptions::background()).await
            }
        );

        assert!(first.success, "{:?}", first.errors);
        assert_eq!(second.aborted, Some(SyncAbort::InProgress));
        assert!(!second.success);
        assert_eq!(second.synced.total(), 0);
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_call_leaves_running_pass_alone() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        for mood in 1..=3 {
            save(&engine, MoodEntry::new(USER, mood, 5, 4)).await;
        }
        engine.remote().set_latency(Duration::from_millis(30));

        let (first, (second, phase_after, third)) = tokio::join!(
            engine.sync_all_data(USER, SyncOptions::background()),
            async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                let second = engine.sync_all_data(USER, SyncOptions::background()).await;
                let phase_after = engine.phase();
                tokio::time::sleep(Duration::from_millis(10)).await;
                let third = engine.sync_all_data(USER, SyncOptions::background()).await;
                (second, phase_after, third)
            }
        );

        assert_eq!(phase_after, SyncPhase::Syncing);
        assert_eq!(second.aborted, Some(SyncAbort::InProgress));
        assert_eq!(third.aborted, Some(SyncAbort::InProgress));
        assert_eq!(third.synced.total(), 0);
        assert!(first.success, "{:?}", first.errors);
        assert_eq!(first.synced.moods, 3);
        assert_eq!(engine.remote().upsert_calls(), 3);
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_resolution_keeps_pass_running() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let local = seed_journal_conflict(&engine).await;
        manual_pass(&engine).await;
        save(&engine, MoodEntry::new(USER, 6, 5, 4)).await;
        engine.remote().set_latency(Duration::from_millis(50));

        let (first, (resolved, phase_after)) = tokio::join!(
            engine.sync_all_data(USER, SyncOptions::background()),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let resolved = engine
                    .resolve_manual_conflict(local.id(), ResolutionKind::LocalWins)
                    .await;
                (resolved, engine.phase())
            }
        );

        assert!(matches!(resolved, Err(SyncError::InProgress)));
        assert_eq!(phase_after, SyncPhase::Syncing);
        assert!(first.aborted.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn forced_sync_uploads_ordinary_edits() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let mut entry = MoodEntry::new(USER, 6, 5, 4);
        save(&engine, entry.clone()).await;
        engine.force_sync_now(USER, None).await;

        entry.mood = 8;
        entry.meta.touch();
        save(&engine, entry.clone()).await;
        let result = engine.force_sync_now(USER, None).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.synced.moods, 1);
        assert!(result.failed.moods.is_empty());
        assert!(engine.get_conflicts().await.unwrap().is_empty());
        let row = engine.remote().row("mood_entries", &entry.meta.id).unwrap();
        assert_eq!(row["mood"], 8);
        assert_eq!(row["version"], 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_stops_between_records() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        for mood in 1..=3 {
            save(&engine, MoodEntry::new(USER, mood, 5, 4)).await;
        }
        engine.remote().set_latency(Duration::from_millis(30));

        let (result, cancelled) = tokio::join!(
            engine.sync_all_data(USER, SyncOptions::background()),
            async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                engine.cancel()
            }
        );

        assert!(cancelled);
        assert_eq!(result.aborted, Some(SyncAbort::Cancelled));
        assert!(!result.success);
        assert!(result.synced.moods < 3);
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert!(engine.store().get_sync_status(USER).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn forced_pass_takes_over() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        for mood in 1..=3 {
            save(&engine, MoodEntry::new(USER, mood, 5, 4)).await;
        }
        engine.remote().set_latency(Duration::from_millis(30));

        let (first, forced) = tokio::join!(
            engine.sync_all_data(USER, SyncOptions::background()),
            async {
                tokio::time::sleep(Duration::from_millis(40)).await;
                let options = SyncOptions {
                    force: true,
                    ..SyncOptions::background()
                };
                engine.sync_all_data(USER, options).await
            }
        );

        assert_eq!(first.aborted, Some(SyncAbort::Cancelled));
        assert!(forced.success, "{:?}", forced.errors);
        assert_eq!(first.synced.moods + forced.synced.moods, 3);
        assert_eq!(engine.get_pending_sync_count(USER).await.unwrap().total(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn local_edit_during_upload_stays_pending() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let mut entry = MoodEntry::new(USER, 6, 5, 4);
        save(&engine, entry.clone()).await;
        engine.remote().set_latency(Duration::from_millis(100));

        let (result, ()) = tokio::join!(
            engine.sync_all_data(USER, SyncOptions::background()),
            async {
                tokio::time::sleep(Duration::from_millis(150)).await;
                entry.mood = 9;
                entry.meta.touch();
                LibSqlRecordStore::new(db.connection())
                    .save(&entry.clone().into())
                    .await
                    .unwrap();
            }
        );

        assert_eq!(result.synced.moods, 0);
        assert_eq!(result.deferred.moods, 1);
        assert!(result.failed.moods.is_empty());
        let current = engine
            .store()
            .get(RecordDomain::Moods, &entry.meta.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.version(), 2);
        assert_eq!(current.sync_status(), RecordStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_size_defers_the_rest() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        engine
            .update_background_sync_config(
                USER,
                &BackgroundSyncConfigUpdate {
                    batch_size: Some(2),
                    ..BackgroundSyncConfigUpdate::default()
                },
            )
            .await
            .unwrap();
        for mood in 1..=3 {
            save(&engine, MoodEntry::new(USER, mood, 5, 4)).await;
        }

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.synced.moods, 2);
        assert_eq!(result.deferred.moods, 1);
        assert_eq!(engine.get_pending_sync_count(USER).await.unwrap().moods, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn poor_network_defers_large_payloads() {
        let db = Database::open_in_memory().await.unwrap();
        let config = EngineConfig {
            large_payload_threshold: 16,
            ..test_config()
        };
        let engine = engine_with(&db, config, NetworkClass::Cellular2g);
        save(&engine, JournalEntry::new(USER, "Long", "A long entry about a long sit")).await;

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.deferred.journals, 1);
        assert_eq!(engine.remote().upsert_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_changes_are_downloaded() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);
        let other_device = SyncableRecord::from(MoodEntry::new(USER, 3, 4, 8));
        engine
            .remote()
            .insert_row("mood_entries", to_wire(&other_device).unwrap());

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.downloaded.moods, 1);
        assert!(result.data_usage.downloaded_bytes > 0);
        assert_eq!(
            stored(&engine, &other_device).await,
            other_device.with_status(RecordStatus::Synced)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn download_pulls_more_than_one_page() {
        let db = Database::open_in_memory().await.unwrap();
        let config = EngineConfig {
            download_page_size: 2,
            ..test_config()
        };
        let engine = engine_with(&db, config, NetworkClass::Wifi);
        let mut rows = Vec::new();
        for (mood, last_modified) in [(3, T1), (5, T2), (7, T3)] {
            let mut entry = MoodEntry::new(USER, mood, 4, 8);
            entry.meta.last_modified = last_modified;
            let record = SyncableRecord::from(entry);
            engine
                .remote()
                .insert_row("mood_entries", to_wire(&record).unwrap());
            rows.push(record);
        }

        let result = engine.sync_all_data(USER, SyncOptions::background()).await;

        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.downloaded.moods, 3);
        for record in &rows {
            assert_eq!(stored(&engine, record).await.sync_status(), RecordStatus::Synced);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn background_config_defaults_and_updates() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db);

        let config = engine.get_background_sync_config(USER).await.unwrap();
        assert_eq!(config, BackgroundSyncConfig::default());
        assert!(engine
            .store()
            .get_setting("background_sync_config.user-1")
            .await
            .unwrap()
            .is_some());

        engine.sync_all_data(USER, SyncOptions::background()).await;
        let updated = engine
            .update_background_sync_config(
                USER,
                &BackgroundSyncConfigUpdate {
                    wifi_only: Some(true),
                    sync_interval: Some(15),
                    ..BackgroundSyncConfigUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(updated.wifi_only);
        assert_eq!(engine.get_background_sync_config(USER).await.unwrap(), updated);
        let status = engine.get_sync_status(USER).await.unwrap();
        assert!(status.sync_preferences.wifi_only);
        assert_eq!(status.sync_preferences.sync_interval, 15);
    }
}
