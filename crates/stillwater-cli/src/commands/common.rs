use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use stillwater_core::config::{EngineConfig, RemoteConfig};
use stillwater_core::db::{Database, LibSqlRecordStore};
use stillwater_core::models::{SyncConflict, SyncableRecord};
use stillwater_core::sync::{
    NetworkClass, NetworkState, RemoteBackend, RestRemoteBackend, StaticNetworkMonitor, SyncEngine,
    SyncError, SyncResult, SyncResultOf,
};
use stillwater_core::util::normalize_text_option;

use crate::error::CliError;

pub const DEFAULT_USER_ID: &str = "local";

/// Settings shared by every command
pub struct Context {
    pub db_path: PathBuf,
    pub user_id: String,
    pub network: NetworkState,
    pub engine_config: EngineConfig,
}

impl Context {
    pub fn resolve(
        db_path: Option<PathBuf>,
        user: Option<String>,
        network: Option<&str>,
    ) -> Result<Self, CliError> {
        Ok(Self {
            db_path: resolve_db_path(db_path),
            user_id: resolve_user_id(user),
            network: resolve_network(network)?,
            engine_config: EngineConfig::from_env(),
        })
    }
}

/// Remote backend chosen from the environment
pub enum CliRemote {
    Rest(RestRemoteBackend),
    /// No remote configured; every call fails without touching the network
    Unconfigured,
}

const NOT_CONFIGURED: &str = "remote backend is not configured";

impl CliRemote {
    pub fn from_env(config: &EngineConfig) -> Result<Self, CliError> {
        match RemoteConfig::from_env().map_err(CliError::Config)? {
            Some(remote) => Ok(Self::Rest(RestRemoteBackend::new(
                &remote,
                config.request_timeout,
            )?)),
            None => Ok(Self::Unconfigured),
        }
    }

    pub fn require_configured(self) -> Result<Self, CliError> {
        match self {
            Self::Unconfigured => Err(CliError::SyncNotConfigured),
            configured @ Self::Rest(_) => Ok(configured),
        }
    }

    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Rest(_))
    }
}

impl RemoteBackend for CliRemote {
    async fn upsert(&self, collection: &str, payload: Value) -> SyncResultOf<String> {
        match self {
            Self::Rest(backend) => backend.upsert(collection, payload).await,
            Self::Unconfigured => Err(SyncError::Network(NOT_CONFIGURED.to_string())),
        }
    }

    async fn query_by_owner_modified_after(
        &self,
        collection: &str,
        user_id: &str,
        since_ms: i64,
        offset: usize,
        limit: usize,
    ) -> SyncResultOf<Vec<Value>> {
        match self {
            Self::Rest(backend) => {
                backend
                    .query_by_owner_modified_after(collection, user_id, since_ms, offset, limit)
                    .await
            }
            Self::Unconfigured => Err(SyncError::Network(NOT_CONFIGURED.to_string())),
        }
    }

    async fn query_by_id(
        &self,
        collection: &str,
        user_id: &str,
        id: &str,
    ) -> SyncResultOf<Option<Value>> {
        match self {
            Self::Rest(backend) => backend.query_by_id(collection, user_id, id).await,
            Self::Unconfigured => Err(SyncError::Network(NOT_CONFIGURED.to_string())),
        }
    }
}

pub type CliEngine<'a> = SyncEngine<LibSqlRecordStore<'a>, CliRemote, StaticNetworkMonitor>;

pub fn build_engine<'a>(db: &'a Database, context: &Context, remote: CliRemote) -> CliEngine<'a> {
    SyncEngine::new(
        LibSqlRecordStore::new(db.connection()),
        remote,
        StaticNetworkMonitor::new(context.network),
        context.engine_config.clone(),
    )
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("STILLWATER_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stillwater")
        .join("stillwater.db")
}

pub fn resolve_user_id(cli_user: Option<String>) -> String {
    normalize_text_option(cli_user)
        .or_else(|| normalize_text_option(env::var("STILLWATER_USER_ID").ok()))
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string())
}

/// Network state from `--network` or `STILLWATER_NETWORK`; Wi-Fi when unset
pub fn resolve_network(cli_network: Option<&str>) -> Result<NetworkState, CliError> {
    let raw = cli_network
        .map(ToString::to_string)
        .or_else(|| env::var("STILLWATER_NETWORK").ok());
    let Some(raw) = normalize_text_option(raw) else {
        return Ok(NetworkState::online(NetworkClass::Wifi));
    };

    let class: NetworkClass = raw.parse()?;
    Ok(if class == NetworkClass::None {
        NetworkState::offline()
    } else {
        NetworkState::online(class)
    })
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path).await?)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Lowercase, strip a leading `#`, drop blanks and duplicates
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: String,
    pub domain: String,
    pub version: i64,
    pub sync_status: String,
    pub last_modified: i64,
    pub relative_time: String,
    pub summary: String,
}

pub fn record_to_list_item(record: &SyncableRecord, now_ms: i64) -> RecordListItem {
    RecordListItem {
        id: record.id().to_string(),
        domain: record.domain().to_string(),
        version: record.version(),
        sync_status: record.sync_status().as_str().to_string(),
        last_modified: record.last_modified(),
        relative_time: format_relative_time(record.last_modified(), now_ms),
        summary: record_summary(record),
    }
}

pub fn format_record_lines(records: &[SyncableRecord], now_ms: i64) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let item = record_to_list_item(record, now_ms);
            format!(
                "{}  {:<10}  v{:<3} {:<7}  {}",
                short_id(&item.id),
                item.relative_time,
                item.version,
                item.sync_status,
                item.summary
            )
        })
        .collect()
}

pub fn record_summary(record: &SyncableRecord) -> String {
    match record {
        SyncableRecord::Session(session) => {
            let done = if session.completed { " done" } else { "" };
            format!(
                "{} {}/{}s{done}",
                session.meditation_id, session.completed_seconds, session.duration_seconds
            )
        }
        SyncableRecord::Mood(mood) => format!(
            "mood {} energy {} stress {}",
            mood.mood, mood.energy, mood.stress
        ),
        SyncableRecord::Journal(journal) => {
            format!("{}: {}", journal.title, preview(&journal.content, 40))
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() > max_chars {
        let truncated: String = first_line.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        first_line.to_string()
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub id: String,
    pub domain: String,
    pub fields: Vec<String>,
    pub suggested: String,
    pub local_version: i64,
    pub remote_version: i64,
    pub detected_at: i64,
    pub detected_at_iso: String,
}

pub fn conflict_to_item(conflict: &SyncConflict) -> ConflictItem {
    ConflictItem {
        id: conflict.id.clone(),
        domain: conflict.domain.to_string(),
        fields: conflict.conflict_fields.clone(),
        suggested: conflict.suggested_resolution.kind.to_string(),
        local_version: conflict.local_data.version(),
        remote_version: conflict.remote_data.version(),
        detected_at: conflict.detected_at,
        detected_at_iso: format_sync_timestamp(conflict.detected_at),
    }
}

pub fn format_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<8}  {}  local=v{} remote=v{}  fields={}  suggested={}",
                format_sync_timestamp(conflict.detected_at),
                conflict.domain,
                conflict.id,
                conflict.local_data.version(),
                conflict.remote_data.version(),
                conflict.conflict_fields.join(","),
                conflict.suggested_resolution.kind
            )
        })
        .collect()
}

pub fn format_sync_result_lines(result: &SyncResult) -> Vec<String> {
    if let Some(reason) = result.aborted {
        return vec![format!("Sync stopped: {reason}")];
    }

    let failed = result.failed.sessions.len() + result.failed.moods.len() + result.failed.journals.len();
    let mut lines = vec![
        format!(
            "Uploaded   sessions {}  moods {}  journals {}",
            result.synced.sessions, result.synced.moods, result.synced.journals
        ),
        format!(
            "Downloaded sessions {}  moods {}  journals {}",
            result.downloaded.sessions, result.downloaded.moods, result.downloaded.journals
        ),
    ];
    if result.deferred.total() > 0 {
        lines.push(format!(
            "Deferred {} record(s) to a later pass",
            result.deferred.total()
        ));
    }
    if failed > 0 {
        lines.push(format!("Failed {failed} record(s)"));
    }
    lines.extend(result.errors.iter().map(|error| format!("  {error}")));
    lines.push(format!(
        "Transferred {} up, {} down in {} ms",
        format_bytes(result.data_usage.uploaded_bytes),
        format_bytes(result.data_usage.downloaded_bytes),
        result.duration.as_millis()
    ));
    lines
}

/// Exit status of a finished pass
pub fn sync_outcome(result: &SyncResult) -> Result<(), CliError> {
    if let Some(reason) = result.aborted {
        return Err(CliError::SyncAborted(reason));
    }
    if !result.errors.is_empty() {
        return Err(CliError::SyncIncomplete(result.errors.len()));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;

    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}
