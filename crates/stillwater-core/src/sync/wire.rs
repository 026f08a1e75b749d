//! Upload and download adapters between local records and backend rows.
//!
//! Locally every timestamp is Unix milliseconds. On the wire `last_modified`
//! and `created_at` are RFC 3339 strings with millisecond precision, and the
//! per-device `sync_status` is not transmitted.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use super::error::{SyncError, SyncResultOf};
use super::remote::RemoteBackend;
use crate::db::LocalStore;
use crate::models::{RecordDomain, RecordStatus, SyncableRecord};
use crate::util::{millis_to_rfc3339, rfc3339_to_millis};

const TIMESTAMP_FIELDS: [&str; 2] = ["last_modified", "created_at"];

/// Run a remote call under a deadline; expiry becomes [`SyncError::Timeout`]
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = SyncResultOf<T>>,
) -> SyncResultOf<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(SyncError::Timeout))
}

/// Map a record to its backend row
pub fn to_wire(record: &SyncableRecord) -> SyncResultOf<Value> {
    let Value::Object(mut row) = serde_json::to_value(record)? else {
        return Err(SyncError::InvalidPayload(
            "record did not serialize to an object".to_string(),
        ));
    };
    row.remove("domain");
    row.remove("sync_status");

    for field in TIMESTAMP_FIELDS {
        if let Some(millis) = row.get(field).and_then(Value::as_i64) {
            row.insert(field.to_string(), Value::String(millis_to_rfc3339(millis)));
        }
    }

    Ok(Value::Object(row))
}

/// Map a backend row to a record of `domain`, marked synced
pub fn from_wire(domain: RecordDomain, row: Value) -> SyncResultOf<SyncableRecord> {
    let Value::Object(mut row) = row else {
        return Err(SyncError::InvalidPayload("row is not an object".to_string()));
    };

    for field in TIMESTAMP_FIELDS {
        let millis = match row.get(field) {
            Some(Value::String(text)) => rfc3339_to_millis(text).ok_or_else(|| {
                SyncError::InvalidPayload(format!("{field} is not RFC 3339: {text}"))
            })?,
            Some(Value::Number(number)) => number.as_i64().ok_or_else(|| {
                SyncError::InvalidPayload(format!("{field} is not an integer"))
            })?,
            _ => {
                return Err(SyncError::InvalidPayload(format!("{field} is missing")));
            }
        };
        row.insert(field.to_string(), Value::from(millis));
    }

    row.insert("domain".to_string(), Value::String(domain.as_str().to_string()));
    row.insert(
        "sync_status".to_string(),
        Value::String(RecordStatus::Synced.as_str().to_string()),
    );

    let record: SyncableRecord = serde_json::from_value(Value::Object(row))?;
    Ok(record)
}

/// Validate and upsert one record, returning the payload size in bytes.
///
/// Upserting by id makes repeated uploads of the same record idempotent.
pub async fn upload_record<R: RemoteBackend>(
    remote: &R,
    record: &SyncableRecord,
    timeout: Duration,
) -> SyncResultOf<u64> {
    record
        .validate()
        .map_err(|error| SyncError::Validation(error.to_string()))?;

    let payload = to_wire(record)?;
    let size = payload_size(&payload);
    let collection = record.domain().collection();

    let id = with_timeout(timeout, remote.upsert(collection, payload)).await?;
    if id != record.id() {
        tracing::warn!("Backend returned id {id} for uploaded record {}", record.id());
    }
    Ok(size)
}

/// Fetch the remote copy of a record
pub async fn fetch_remote<R: RemoteBackend>(
    remote: &R,
    domain: RecordDomain,
    user_id: &str,
    id: &str,
    timeout: Duration,
) -> SyncResultOf<Option<SyncableRecord>> {
    let row = with_timeout(timeout, remote.query_by_id(domain.collection(), user_id, id)).await?;
    row.map(|row| from_wire(domain, row)).transpose()
}

/// Outcome of a delta download for one domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Rows written to the local store
    pub applied: usize,
    /// Rows left alone because the local copy is newer or unsynced
    pub skipped: usize,
    pub bytes: u64,
    /// Per-row problems; they never abort the download
    pub errors: Vec<String>,
}

/// Pull rows modified after `since_ms` and store them locally as synced.
///
/// Pages of `page_size` rows are fetched until a short page comes back. A
/// local copy that is not synced, or whose version is not older than the
/// remote one, is kept.
pub async fn download_remote<S: LocalStore, R: RemoteBackend>(
    store: &S,
    remote: &R,
    domain: RecordDomain,
    user_id: &str,
    since_ms: i64,
    page_size: usize,
    timeout: Duration,
) -> SyncResultOf<DownloadOutcome> {
    let page_size = page_size.max(1);
    let mut outcome = DownloadOutcome::default();
    let mut offset = 0;
    loop {
        let rows = with_timeout(
            timeout,
            remote.query_by_owner_modified_after(
                domain.collection(),
                user_id,
                since_ms,
                offset,
                page_size,
            ),
        )
        .await?;
        let fetched = rows.len();
        apply_page(store, domain, user_id, rows, &mut outcome).await?;
        if fetched < page_size {
            break;
        }
        offset += fetched;
    }

    Ok(outcome)
}

async fn apply_page<S: LocalStore>(
    store: &S,
    domain: RecordDomain,
    user_id: &str,
    rows: Vec<Value>,
    outcome: &mut DownloadOutcome,
) -> SyncResultOf<()> {
    for row in rows {
        outcome.bytes += payload_size(&row);
        let incoming = match from_wire(domain, row) {
            Ok(record) if record.user_id() == user_id => record,
            Ok(record) => {
                outcome
                    .errors
                    .push(format!("{domain} {}: row owned by another user", record.id()));
                continue;
            }
            Err(error) => {
                outcome.errors.push(format!("{domain}: {error}"));
                continue;
            }
        };

        let written = match store.get(domain, incoming.id()).await? {
            None => {
                store.save(&incoming).await?;
                true
            }
            Some(local)
                if local.sync_status() == RecordStatus::Synced
                    && local.version() < incoming.version() =>
            {
                store.replace_if_version(&incoming, local.version()).await?
            }
            Some(_) => false,
        };

        if written {
            tracing::debug!("Downloaded {domain} {} v{}", incoming.id(), incoming.version());
            outcome.applied += 1;
        } else {
            outcome.skipped += 1;
        }
    }
    Ok(())
}

pub(crate) fn payload_size(payload: &Value) -> u64 {
    serde_json::to_vec(payload).map_or(0, |bytes| bytes.len() as u64)
}
