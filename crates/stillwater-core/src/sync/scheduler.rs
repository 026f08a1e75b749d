//! Unattended sync triggers: periodic ticks and app lifecycle events.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::engine::{SyncEngine, SyncOptions, SyncResult};
use super::error::SyncResultOf;
use super::network::{NetworkClass, NetworkMonitor};
use super::remote::RemoteBackend;
use crate::db::LocalStore;
use crate::models::BackgroundSyncConfig;
use crate::util::now_millis;

const MINUTE_MS: i64 = 60_000;

/// Outcome of one scheduling check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// Background sync is switched off for the user
    Disabled,
    /// The interval has not elapsed; next pass is due at `next_due_at` (Unix ms)
    NotDue { next_due_at: i64 },
    Offline,
    /// Wi-Fi only is on and the current connection does not qualify
    NetworkRestricted(NetworkClass),
    Ran(SyncResult),
}

pub struct BackgroundScheduler<'e, S, R, N> {
    engine: &'e SyncEngine<S, R, N>,
}

impl<'e, S: LocalStore, R: RemoteBackend, N: NetworkMonitor> BackgroundScheduler<'e, S, R, N> {
    pub const fn new(engine: &'e SyncEngine<S, R, N>) -> Self {
        Self { engine }
    }

    /// Run a background pass if the user's config and the network allow it
    pub async fn schedule_background_sync(&self, user_id: &str) -> SyncResultOf<ScheduleDecision> {
        let config = self.engine.get_background_sync_config(user_id).await?;
        if !config.enabled {
            return Ok(ScheduleDecision::Disabled);
        }

        let status = self.engine.get_sync_status(user_id).await?;
        if let Some(last_sync_at) = status.last_sync_at {
            let next_due_at = last_sync_at + i64::from(config.sync_interval) * MINUTE_MS;
            if now_millis() < next_due_at {
                return Ok(ScheduleDecision::NotDue { next_due_at });
            }
        }

        self.run_if_allowed(user_id, &config).await
    }

    /// Lifecycle hook for app launch
    pub async fn on_app_start(&self, user_id: &str) -> SyncResultOf<Option<ScheduleDecision>> {
        let config = self.engine.get_background_sync_config(user_id).await?;
        if !config.enabled || !config.sync_on_app_start {
            return Ok(None);
        }
        tracing::debug!("App start sync for {user_id}");
        self.run_if_allowed(user_id, &config).await.map(Some)
    }

    /// Lifecycle hook for the app moving to the background
    pub async fn on_app_background(&self, user_id: &str) -> SyncResultOf<Option<ScheduleDecision>> {
        let config = self.engine.get_background_sync_config(user_id).await?;
        if !config.enabled || !config.sync_on_app_background {
            return Ok(None);
        }
        tracing::debug!("App background sync for {user_id}");
        self.run_if_allowed(user_id, &config).await.map(Some)
    }

    async fn run_if_allowed(
        &self,
        user_id: &str,
        config: &BackgroundSyncConfig,
    ) -> SyncResultOf<ScheduleDecision> {
        let network = self.engine.network().current();
        if !network.connected {
            return Ok(ScheduleDecision::Offline);
        }
        if config.wifi_only && !network.class.is_unmetered_or_fast() {
            return Ok(ScheduleDecision::NetworkRestricted(network.class));
        }

        let result = self
            .engine
            .sync_all_data(user_id, SyncOptions::background())
            .await;
        Ok(ScheduleDecision::Ran(result))
    }

    /// Check every `tick` until `shutdown` turns true or its sender is dropped
    pub async fn run(&self, user_id: &str, tick: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Background sync scheduler started for {user_id}");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.schedule_background_sync(user_id).await {
                        Ok(ScheduleDecision::Ran(result)) => {
                            tracing::info!(
                                "Background sync ran: {} uploaded, {} downloaded, success {}",
                                result.synced.total(),
                                result.downloaded.total(),
                                result.success
                            );
                        }
                        Ok(decision) => tracing::debug!("Background sync skipped: {decision:?}"),
                        Err(error) => tracing::warn!("Background sync check failed: {error}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Background sync scheduler stopped for {user_id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::db::{Database, LibSqlRecordStore};
    use crate::models::{BackgroundSyncConfigUpdate, MoodEntry, SyncableRecord};
    use crate::sync::memory::MemoryRemoteBackend;
    use crate::sync::network::{NetworkState, StaticNetworkMonitor};
    use pretty_assertions::assert_eq;

    const USER: &str = "user-1";

    type TestEngine<'a> =
        SyncEngine<LibSqlRecordStore<'a>, MemoryRemoteBackend, StaticNetworkMonitor>;

    fn engine(db: &Database, class: NetworkClass) -> TestEngine<'_> {
        SyncEngine::new(
            LibSqlRecordStore::new(db.connection()),
            MemoryRemoteBackend::new(),
            StaticNetworkMonitor::new(NetworkState::online(class)),
            EngineConfig::default(),
        )
    }

    async fn update(engine: &TestEngine<'_>, update: BackgroundSyncConfigUpdate) {
        engine
            .update_background_sync_config(USER, &update)
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_check_runs_a_pass() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db, NetworkClass::Wifi);
        let mood = SyncableRecord::from(MoodEntry::new(USER, 5, 5, 5));
        engine.store().save(&mood).await.unwrap();

        let decision = BackgroundScheduler::new(&engine)
            .schedule_background_sync(USER)
            .await
            .unwrap();

        let ScheduleDecision::Ran(result) = decision else {
            panic!("expected a pass, got {decision:?}");
        };
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.synced.moods, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_check_within_interval_is_not_due() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db, NetworkClass::Wifi);
        let scheduler = BackgroundScheduler::new(&engine);

        scheduler.schedule_background_sync(USER).await.unwrap();
        let decision = scheduler.schedule_background_sync(USER).await.unwrap();

        let ScheduleDecision::NotDue { next_due_at } = decision else {
            panic!("expected not due, got {decision:?}");
        };
        let last_sync_at = engine
            .get_sync_status(USER)
            .await
            .unwrap()
            .last_sync_at
            .unwrap();
        assert_eq!(next_due_at, last_sync_at + 30 * MINUTE_MS);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_config_never_runs() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db, NetworkClass::Wifi);
        update(
            &engine,
            BackgroundSyncConfigUpdate {
                enabled: Some(false),
                ..BackgroundSyncConfigUpdate::default()
            },
        )
        .await;
        let scheduler = BackgroundScheduler::new(&engine);

        assert_eq!(
            scheduler.schedule_background_sync(USER).await.unwrap(),
            ScheduleDecision::Disabled
        );
        assert_eq!(scheduler.on_app_start(USER).await.unwrap(), None);
        assert_eq!(engine.remote().upsert_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn wifi_only_blocks_slow_cellular() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db, NetworkClass::Cellular3g);
        update(
            &engine,
            BackgroundSyncConfigUpdate {
                wifi_only: Some(true),
                ..BackgroundSyncConfigUpdate::default()
            },
        )
        .await;

        assert_eq!(
            BackgroundScheduler::new(&engine)
                .schedule_background_sync(USER)
                .await
                .unwrap(),
            ScheduleDecision::NetworkRestricted(NetworkClass::Cellular3g)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_check_reports_offline() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db, NetworkClass::Wifi);
        engine.network().set(NetworkState::offline());

        assert_eq!(
            BackgroundScheduler::new(&engine)
                .on_app_background(USER)
                .await
                .unwrap(),
            Some(ScheduleDecision::Offline)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_loop_stops_on_shutdown() {
        let db = Database::open_in_memory().await.unwrap();
        let engine = engine(&db, NetworkClass::Wifi);
        let scheduler = BackgroundScheduler::new(&engine);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::join!(
            scheduler.run(USER, Duration::from_millis(10), shutdown_rx),
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                shutdown_tx.send(true).unwrap();
            }
        );

        assert!(engine
            .get_sync_status(USER)
            .await
            .unwrap()
            .last_sync_at
            .is_some());
    }
}
