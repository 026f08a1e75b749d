//! Per-user sync status snapshot

use serde::{Deserialize, Serialize};

use super::{BackgroundSyncConfig, PerDomain};
use crate::util::utc_day_start;

/// Bytes moved by the sync engine during the current usage period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUsage {
    pub uploaded_bytes: u64,
    pub downloaded_bytes: u64,
    /// Start of the usage period (UTC midnight, Unix ms)
    pub period_start: i64,
}

impl DataUsage {
    pub const fn total_bytes(&self) -> u64 {
        self.uploaded_bytes + self.downloaded_bytes
    }

    /// Usage for the day containing `now`, resetting the counters when the
    /// stored period has ended
    #[must_use]
    pub const fn for_day(self, now: i64) -> Self {
        let period_start = utc_day_start(now);
        if self.period_start == period_start {
            self
        } else {
            Self {
                uploaded_bytes: 0,
                downloaded_bytes: 0,
                period_start,
            }
        }
    }

    /// Add one pass worth of traffic
    #[must_use]
    pub const fn add(self, uploaded_bytes: u64, downloaded_bytes: u64) -> Self {
        Self {
            uploaded_bytes: self.uploaded_bytes.saturating_add(uploaded_bytes),
            downloaded_bytes: self.downloaded_bytes.saturating_add(downloaded_bytes),
            period_start: self.period_start,
        }
    }
}

/// User-facing sync preferences mirrored from the background config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPreferences {
    pub wifi_only: bool,
    pub background_sync: bool,
    /// Minutes between unattended passes
    pub sync_interval: u32,
}

impl From<&BackgroundSyncConfig> for SyncPreferences {
    fn from(config: &BackgroundSyncConfig) -> Self {
        Self {
            wifi_only: config.wifi_only,
            background_sync: config.enabled,
            sync_interval: config.sync_interval,
        }
    }
}

impl Default for SyncPreferences {
    fn default() -> Self {
        Self::from(&BackgroundSyncConfig::default())
    }
}

/// Snapshot written at the end of every completed pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub user_id: String,
    /// Start time of the last completed pass (Unix ms)
    pub last_sync_at: Option<i64>,
    pub pending_counts: PerDomain<usize>,
    /// Ids that failed during the last pass
    pub failed_sync: PerDomain<Vec<String>>,
    pub data_usage: DataUsage,
    pub sync_preferences: SyncPreferences,
}

impl SyncStatus {
    /// Status for a user that has never synced
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            last_sync_at: None,
            pending_counts: PerDomain::default(),
            failed_sync: PerDomain::default(),
            data_usage: DataUsage::default(),
            sync_preferences: SyncPreferences::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    #[test]
    fn test_usage_resets_on_new_day() {
        let today = 1_700_049_600_000;
        let usage = DataUsage::default().for_day(today).add(100, 50);
        assert_eq!(usage.total_bytes(), 150);

        let same_day = usage.for_day(today + 60_000);
        assert_eq!(same_day.total_bytes(), 150);

        let next_day = usage.for_day(today + DAY_MS);
        assert_eq!(next_day.total_bytes(), 0);
        assert_eq!(next_day.period_start, utc_day_start(today + DAY_MS));
    }

    #[test]
    fn test_preferences_follow_config() {
        let config = BackgroundSyncConfig {
            wifi_only: true,
            sync_interval: 15,
            ..BackgroundSyncConfig::default()
        };
        let preferences = SyncPreferences::from(&config);
        assert!(preferences.wifi_only);
        assert_eq!(preferences.sync_interval, 15);
    }
}
