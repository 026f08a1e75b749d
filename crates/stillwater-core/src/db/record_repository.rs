//! Local record store implementation

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{RecordDomain, RecordStatus, SyncStatus, SyncableRecord};

/// Local persistence contract consumed by the sync engine
#[allow(async_fn_in_trait)]
pub trait LocalStore {
    /// Records of `domain` owned by `user_id` that are not yet synced, oldest change first
    async fn get_pending(&self, user_id: &str, domain: RecordDomain)
        -> Result<Vec<SyncableRecord>>;

    /// Get a record by domain and id
    async fn get(&self, domain: RecordDomain, id: &str) -> Result<Option<SyncableRecord>>;

    /// Insert or replace a record unconditionally
    async fn save(&self, record: &SyncableRecord) -> Result<()>;

    /// Remove a record, returning whether it existed
    async fn delete(&self, domain: RecordDomain, id: &str) -> Result<bool>;

    /// Set the sync status only if the stored version still equals `expected_version`
    async fn set_status_if_version(
        &self,
        domain: RecordDomain,
        id: &str,
        expected_version: i64,
        status: RecordStatus,
    ) -> Result<bool>;

    /// Replace the stored record only if its version still equals `expected_version`
    async fn replace_if_version(
        &self,
        record: &SyncableRecord,
        expected_version: i64,
    ) -> Result<bool>;

    async fn get_sync_status(&self, user_id: &str) -> Result<Option<SyncStatus>>;

    async fn set_sync_status(&self, status: &SyncStatus) -> Result<()>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Mark a record synced unless it was mutated after `expected_version` was read
    async fn mark_synced(
        &self,
        domain: RecordDomain,
        id: &str,
        expected_version: i64,
    ) -> Result<bool> {
        self.set_status_if_version(domain, id, expected_version, RecordStatus::Synced)
            .await
    }
}

/// libSQL implementation of `LocalStore`
pub struct LibSqlRecordStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlRecordStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a record from `(sync_status, body)` columns
    fn parse_record(row: &libsql::Row) -> Result<SyncableRecord> {
        let status: String = row.get(0)?;
        let body: String = row.get(1)?;
        let record: SyncableRecord = serde_json::from_str(&body)?;
        Ok(record.with_status(status.parse()?))
    }

    /// All records of a user, newest change first
    pub async fn list(
        &self,
        user_id: &str,
        domain: RecordDomain,
        limit: usize,
    ) -> Result<Vec<SyncableRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT sync_status, body FROM records
                 WHERE user_id = ? AND domain = ?
                 ORDER BY last_modified DESC
                 LIMIT ?",
                params![user_id, domain.as_str(), limit],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(&row)?);
        }
        Ok(records)
    }

    async fn write_guarded(&self, record: &SyncableRecord, expected_version: i64) -> Result<bool> {
        let meta = record.meta();
        let body = serde_json::to_string(record)?;
        let rows = self
            .conn
            .execute(
                "UPDATE records
                 SET user_id = ?, version = ?, last_modified = ?, created_at = ?,
                     sync_status = ?, body = ?
                 WHERE domain = ? AND id = ? AND version = ?",
                params![
                    meta.user_id.as_str(),
                    meta.version,
                    meta.last_modified,
                    meta.created_at,
                    meta.sync_status.as_str(),
                    body,
                    record.domain().as_str(),
                    meta.id.as_str(),
                    expected_version
                ],
            )
            .await?;
        Ok(rows > 0)
    }
}

impl LocalStore for LibSqlRecordStore<'_> {
    async fn get_pending(
        &self,
        user_id: &str,
        domain: RecordDomain,
    ) -> Result<Vec<SyncableRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT sync_status, body FROM records
                 WHERE user_id = ? AND domain = ? AND sync_status != 'synced'
                 ORDER BY last_modified ASC",
                params![user_id, domain.as_str()],
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(Self::parse_record(&row)?);
        }
        Ok(records)
    }

    async fn get(&self, domain: RecordDomain, id: &str) -> Result<Option<SyncableRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT sync_status, body FROM records WHERE domain = ? AND id = ?",
                params![domain.as_str(), id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &SyncableRecord) -> Result<()> {
        record.validate()?;
        let meta = record.meta();
        let body = serde_json::to_string(record)?;
        self.conn
            .execute(
                "INSERT INTO records
                    (domain, id, user_id, version, last_modified, created_at, sync_status, body)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(domain, id) DO UPDATE SET
                    user_id = excluded.user_id,
                    version = excluded.version,
                    last_modified = excluded.last_modified,
                    created_at = excluded.created_at,
                    sync_status = excluded.sync_status,
                    body = excluded.body",
                params![
                    record.domain().as_str(),
                    meta.id.as_str(),
                    meta.user_id.as_str(),
                    meta.version,
                    meta.last_modified,
                    meta.created_at,
                    meta.sync_status.as_str(),
                    body
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, domain: RecordDomain, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM records WHERE domain = ? AND id = ?",
                params![domain.as_str(), id],
            )
            .await?;
        Ok(rows > 0)
    }

    async fn set_status_if_version(
        &self,
        domain: RecordDomain,
        id: &str,
        expected_version: i64,
        status: RecordStatus,
    ) -> Result<bool> {
        let Some(current) = self.get(domain, id).await? else {
            return Ok(false);
        };
        if current.version() != expected_version {
            return Ok(false);
        }
        self.write_guarded(&current.with_status(status), expected_version)
            .await
    }

    async fn replace_if_version(
        &self,
        record: &SyncableRecord,
        expected_version: i64,
    ) -> Result<bool> {
        record.validate()?;
        self.write_guarded(record, expected_version).await
    }

    async fn get_sync_status(&self, user_id: &str) -> Result<Option<SyncStatus>> {
        let mut rows = self
            .conn
            .query(
                "SELECT body FROM sync_status WHERE user_id = ?",
                params![user_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let body: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn set_sync_status(&self, status: &SyncStatus) -> Result<()> {
        let body = serde_json::to_string(status)?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_status (user_id, body) VALUES (?, ?)",
                params![status.user_id.as_str(), body],
            )
            .await?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<String>(0)?)),
            None => Ok(None),
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO settings (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [key, value],
            )
            .await?;
        Ok(())
    }
}
