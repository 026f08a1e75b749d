//! In-process remote backend.
//!
//! Holds rows in memory and can inject latency or failures, which makes it the
//! backend of choice for tests and offline demos.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Map, Value};

use super::error::{SyncError, SyncResultOf};
use super::remote::RemoteBackend;
use crate::util::rfc3339_to_millis;

/// Failure the backend returns instead of serving a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Timeout,
    Network,
    Validation,
}

impl InjectedFailure {
    fn into_error(self) -> SyncError {
        match self {
            Self::Timeout => SyncError::Timeout,
            Self::Network => SyncError::Network("injected connection reset".to_string()),
            Self::Validation => SyncError::Validation("injected constraint violation".to_string()),
        }
    }
}

type Collections = HashMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Default)]
pub struct MemoryRemoteBackend {
    collections: Mutex<Collections>,
    upsert_failures: Mutex<VecDeque<InjectedFailure>>,
    lookup_failures: Mutex<VecDeque<InjectedFailure>>,
    latency: Mutex<Duration>,
    upsert_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryRemoteBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` upserts with `failure`
    pub fn fail_next_upserts(&self, count: usize, failure: InjectedFailure) {
        lock(&self.upsert_failures).extend(std::iter::repeat(failure).take(count));
    }

    /// Fail the next `count` single-row lookups with `failure`
    pub fn fail_next_lookups(&self, count: usize, failure: InjectedFailure) {
        lock(&self.lookup_failures).extend(std::iter::repeat(failure).take(count));
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Upserts attempted so far, failed ones included
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn row_count(&self, collection: &str) -> usize {
        lock(&self.collections).get(collection).map_or(0, BTreeMap::len)
    }

    pub fn row(&self, collection: &str, id: &str) -> Option<Value> {
        lock(&self.collections)
            .get(collection)
            .and_then(|rows| rows.get(id))
            .cloned()
    }

    /// Store a row directly, as if another device had uploaded it
    pub fn insert_row(&self, collection: &str, row: Value) {
        if let Some(id) = row.get("id").and_then(Value::as_str).map(ToString::to_string) {
            lock(&self.collections)
                .entry(collection.to_string())
                .or_default()
                .insert(id, row);
        }
    }

    async fn delay(&self) {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

fn owned_by(row: &Value, user_id: &str) -> bool {
    row.get("user_id").and_then(Value::as_str) == Some(user_id)
}

fn modified_millis(row: &Value) -> i64 {
    row.get("last_modified")
        .and_then(Value::as_str)
        .and_then(rfc3339_to_millis)
        .unwrap_or(i64::MIN)
}

impl RemoteBackend for MemoryRemoteBackend {
    async fn upsert(&self, collection: &str, payload: Value) -> SyncResultOf<String> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        if let Some(failure) = lock(&self.upsert_failures).pop_front() {
            return Err(failure.into_error());
        }

        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| SyncError::Validation("row has no id".to_string()))?;

        let mut collections = lock(&self.collections);
        let rows = collections.entry(collection.to_string()).or_default();
        let row = rows
            .entry(id.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        match (row, payload) {
            (Value::Object(existing), Value::Object(update)) => existing.extend(update),
            (row, payload) => *row = payload,
        }
        Ok(id)
    }

    async fn query_by_owner_modified_after(
        &self,
        collection: &str,
        user_id: &str,
        since_ms: i64,
        offset: usize,
        limit: usize,
    ) -> SyncResultOf<Vec<Value>> {
        self.delay().await;

        let collections = lock(&self.collections);
        let mut rows: Vec<Value> = collections
            .get(collection)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|row| owned_by(row, user_id) && modified_millis(row) > since_ms)
            .cloned()
            .collect();
        rows.sort_by_key(|row| std::cmp::Reverse(modified_millis(row)));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn query_by_id(
        &self,
        collection: &str,
        user_id: &str,
        id: &str,
    ) -> SyncResultOf<Option<Value>> {
        self.delay().await;

        if let Some(failure) = lock(&self.lookup_failures).pop_front() {
            return Err(failure.into_error());
        }

        Ok(self
            .row(collection, id)
            .filter(|row| owned_by(row, user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str, user_id: &str, last_modified: &str) -> Value {
        json!({ "id": id, "user_id": user_id, "last_modified": last_modified, "mood": 5 })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_merges_by_id() {
        let backend = MemoryRemoteBackend::new();
        backend
            .upsert("mood_entries", row("m1", "u1", "2024-01-01T00:00:00.000Z"))
            .await
            .unwrap();
        backend
            .upsert("mood_entries", json!({ "id": "m1", "mood": 8 }))
            .await
            .unwrap();

        assert_eq!(backend.row_count("mood_entries"), 1);
        let stored = backend.row("mood_entries", "m1").unwrap();
        assert_eq!(stored["mood"], 8);
        assert_eq!(stored["user_id"], "u1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn query_filters_owner_and_orders_newest_first() {
        let backend = MemoryRemoteBackend::new();
        backend.insert_row("mood_entries", row("a", "u1", "2024-01-01T00:00:00.000Z"));
        backend.insert_row("mood_entries", row("b", "u1", "2024-01-03T00:00:00.000Z"));
        backend.insert_row("mood_entries", row("c", "u2", "2024-01-04T00:00:00.000Z"));

        let rows = backend
            .query_by_owner_modified_after("mood_entries", "u1", 0, 0, 10)
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|row| row["id"].as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let rows = backend
            .query_by_owner_modified_after("mood_entries", "u1", 0, 1, 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "a");

        assert!(backend
            .query_by_id("mood_entries", "u1", "c")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn injected_failures_are_consumed_in_order() {
        let backend = MemoryRemoteBackend::new();
        backend.fail_next_upserts(1, InjectedFailure::Timeout);
        backend.fail_next_upserts(1, InjectedFailure::Validation);

        let payload = row("m1", "u1", "2024-01-01T00:00:00.000Z");
        assert!(matches!(
            backend.upsert("mood_entries", payload.clone()).await,
            Err(SyncError::Timeout)
        ));
        assert!(matches!(
            backend.upsert("mood_entries", payload.clone()).await,
            Err(SyncError::Validation(_))
        ));
        assert!(backend.upsert("mood_entries", payload).await.is_ok());
        assert_eq!(backend.upsert_calls(), 3);
    }
}
