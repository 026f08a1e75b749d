//! Runtime configuration for the sync engine and remote backend.
//!
//! Values come from `STILLWATER_*` environment variables with defaults for
//! anything unset. Background-sync preferences are per user and live in the
//! local store instead (see [`crate::models::BackgroundSyncConfig`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::PerDomain;
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_DOWNLOAD_PAGE_SIZE: usize = 100;
const DEFAULT_LARGE_PAYLOAD_BYTES: usize = 256 * 1024;
const DEFAULT_DAILY_CAP_BYTES: u64 = 50 * 1024 * 1024;

/// Tunables of the sync engine that are not user preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline applied to every remote call
    pub request_timeout: Duration,
    /// First retry delay; later delays grow from it
    pub retry_base_delay: Duration,
    /// Maximum rows pulled per domain in one delta download
    pub download_page_size: usize,
    /// Records above this JSON size are deferred when the plan skips large payloads
    pub large_payload_threshold: usize,
    /// Daily traffic budget the optimizer measures usage against
    pub daily_data_cap_bytes: u64,
    /// Payload fields compared by the conflict detector, per domain
    pub conflict_fields: PerDomain<Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            download_page_size: DEFAULT_DOWNLOAD_PAGE_SIZE,
            large_payload_threshold: DEFAULT_LARGE_PAYLOAD_BYTES,
            daily_data_cap_bytes: DEFAULT_DAILY_CAP_BYTES,
            conflict_fields: default_conflict_fields(),
        }
    }
}

/// Watched conflict fields per domain
pub fn default_conflict_fields() -> PerDomain<Vec<String>> {
    let owned = |fields: &[&str]| fields.iter().map(ToString::to_string).collect();
    PerDomain {
        sessions: owned(&["completed_seconds", "completed", "quality", "notes", "tags"]),
        moods: owned(&["mood", "energy", "stress", "notes", "tags"]),
        journals: owned(&["title", "content", "mood", "tags"]),
    }
}

impl EngineConfig {
    /// Build from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unparsable values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let number = |key: &str| {
            normalize_text_option(lookup(key)).and_then(|value| value.parse::<u64>().ok())
        };

        if let Some(ms) = number("STILLWATER_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = number("STILLWATER_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay = Duration::from_millis(ms);
        }
        if let Some(size) = number("STILLWATER_DOWNLOAD_PAGE_SIZE") {
            config.download_page_size = usize::try_from(size).unwrap_or(usize::MAX).max(1);
        }
        if let Some(bytes) = number("STILLWATER_LARGE_PAYLOAD_BYTES") {
            config.large_payload_threshold = usize::try_from(bytes).unwrap_or(usize::MAX);
        }
        if let Some(bytes) = number("STILLWATER_DAILY_CAP_BYTES") {
            config.daily_data_cap_bytes = bytes.max(1);
        }

        for (key, fields) in [
            ("STILLWATER_CONFLICT_FIELDS_SESSIONS", &mut config.conflict_fields.sessions),
            ("STILLWATER_CONFLICT_FIELDS_MOODS", &mut config.conflict_fields.moods),
            ("STILLWATER_CONFLICT_FIELDS_JOURNALS", &mut config.conflict_fields.journals),
        ] {
            if let Some(list) = normalize_text_option(lookup(key)) {
                *fields = list
                    .split(',')
                    .map(str::trim)
                    .filter(|field| !field.is_empty())
                    .map(ToString::to_string)
                    .collect();
            }
        }

        config
    }
}

/// Connection details for the REST record backend
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Base URL without trailing slash
    pub base_url: String,
    /// API key sent as `apikey` and bearer token
    pub api_key: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl RemoteConfig {
    /// Validate and normalize remote settings
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, String> {
        let base_url = normalize_text_option(Some(base_url.into()))
            .ok_or_else(|| "remote URL must not be empty".to_string())?;
        if !is_http_url(&base_url) {
            return Err("remote URL must include http:// or https://".to_string());
        }
        let api_key = normalize_text_option(Some(api_key.into()))
            .ok_or_else(|| "remote API key must not be empty".to_string())?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Read `STILLWATER_REMOTE_URL` and `STILLWATER_REMOTE_KEY`.
    ///
    /// Returns `Ok(None)` when neither is set.
    pub fn from_env() -> Result<Option<Self>, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, String> {
        let url = normalize_text_option(lookup("STILLWATER_REMOTE_URL"));
        let key = normalize_text_option(lookup("STILLWATER_REMOTE_KEY"));
        match (url, key) {
            (None, None) => Ok(None),
            (Some(url), Some(key)) => Self::new(url, key).map(Some),
            (Some(_), None) => Err("STILLWATER_REMOTE_KEY is required when STILLWATER_REMOTE_URL is set".to_string()),
            (None, Some(_)) => Err("STILLWATER_REMOTE_URL is required when STILLWATER_REMOTE_KEY is set".to_string()),
        }
    }
}
