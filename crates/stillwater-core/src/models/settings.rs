//! Background sync settings model

use serde::{Deserialize, Serialize};

use super::{PerDomain, RecordDomain};

/// Unattended sync configuration, stored per user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSyncConfig {
    pub enabled: bool,
    /// Minutes between unattended passes
    pub sync_interval: u32,
    /// Only sync on Wi-Fi or an equivalent fast connection
    pub wifi_only: bool,
    /// Failed upload attempts allowed per record in one pass
    pub max_retries: u32,
    pub exponential_backoff: bool,
    pub sync_on_app_start: bool,
    pub sync_on_app_background: bool,
    /// Upper bound on records uploaded per domain per pass
    pub batch_size: usize,
    /// Processing weight per domain, higher goes first
    pub priority: PerDomain<u32>,
}

impl Default for BackgroundSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval: 30,
            wifi_only: false,
            max_retries: 3,
            exponential_backoff: true,
            sync_on_app_start: true,
            sync_on_app_background: true,
            batch_size: 50,
            priority: PerDomain {
                sessions: 3,
                moods: 2,
                journals: 1,
            },
        }
    }
}

impl BackgroundSyncConfig {
    /// Domains ordered by descending priority weight (ties keep the default order)
    pub fn domain_order(&self) -> Vec<RecordDomain> {
        let mut domains = RecordDomain::ALL.to_vec();
        domains.sort_by_key(|domain| std::cmp::Reverse(*self.priority.get(*domain)));
        domains
    }

    /// Apply a partial update
    pub fn apply(&mut self, update: &BackgroundSyncConfigUpdate) {
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(sync_interval) = update.sync_interval {
            self.sync_interval = sync_interval.max(1);
        }
        if let Some(wifi_only) = update.wifi_only {
            self.wifi_only = wifi_only;
        }
        if let Some(max_retries) = update.max_retries {
            self.max_retries = max_retries.max(1);
        }
        if let Some(exponential_backoff) = update.exponential_backoff {
            self.exponential_backoff = exponential_backoff;
        }
        if let Some(sync_on_app_start) = update.sync_on_app_start {
            self.sync_on_app_start = sync_on_app_start;
        }
        if let Some(sync_on_app_background) = update.sync_on_app_background {
            self.sync_on_app_background = sync_on_app_background;
        }
        if let Some(batch_size) = update.batch_size {
            self.batch_size = batch_size.max(1);
        }
        if let Some(priority) = &update.priority {
            self.priority = priority.clone();
        }
    }
}

/// Partial update for [`BackgroundSyncConfig`]; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundSyncConfigUpdate {
    pub enabled: Option<bool>,
    pub sync_interval: Option<u32>,
    pub wifi_only: Option<bool>,
    pub max_retries: Option<u32>,
    pub exponential_backoff: Option<bool>,
    pub sync_on_app_start: Option<bool>,
    pub sync_on_app_background: Option<bool>,
    pub batch_size: Option<usize>,
    pub priority: Option<PerDomain<u32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = BackgroundSyncConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_retries, 3);
        assert_eq!(
            config.domain_order(),
            vec![RecordDomain::Sessions, RecordDomain::Moods, RecordDomain::Journals]
        );
    }

    #[test]
    fn test_priority_reorders_domains() {
        let config = BackgroundSyncConfig {
            priority: PerDomain {
                sessions: 1,
                moods: 5,
                journals: 5,
            },
            ..BackgroundSyncConfig::default()
        };
        assert_eq!(
            config.domain_order(),
            vec![RecordDomain::Moods, RecordDomain::Journals, RecordDomain::Sessions]
        );
    }

    #[test]
    fn test_partial_update() {
        let mut config = BackgroundSyncConfig::default();
        config.apply(&BackgroundSyncConfigUpdate {
            wifi_only: Some(true),
            sync_interval: Some(0),
            ..BackgroundSyncConfigUpdate::default()
        });
        assert!(config.wifi_only);
        assert_eq!(config.sync_interval, 1);
        assert_eq!(config.batch_size, 50);
    }

    #[test]
    fn test_config_deserializes_missing_fields() {
        let config: BackgroundSyncConfig = serde_json::from_str(r#"{"enabled":false}"#).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.sync_interval, 30);
    }
}
