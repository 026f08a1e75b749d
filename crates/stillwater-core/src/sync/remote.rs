//! Remote record backend contract

use serde_json::Value;

use super::error::SyncResultOf;

/// Remote collection store the engine uploads to and downloads from.
///
/// Rows are JSON objects in wire form (see [`super::wire`]). Every row
/// carries `id`, `user_id` and an RFC 3339 `last_modified`.
#[allow(async_fn_in_trait)]
pub trait RemoteBackend {
    /// Insert or update the row with the payload's `id`, returning that id
    async fn upsert(&self, collection: &str, payload: Value) -> SyncResultOf<String>;

    /// Rows owned by `user_id` modified strictly after `since_ms`, newest
    /// first, skipping the first `offset` of them
    async fn query_by_owner_modified_after(
        &self,
        collection: &str,
        user_id: &str,
        since_ms: i64,
        offset: usize,
        limit: usize,
    ) -> SyncResultOf<Vec<Value>>;

    /// The row with `id` owned by `user_id`, if any
    async fn query_by_id(
        &self,
        collection: &str,
        user_id: &str,
        id: &str,
    ) -> SyncResultOf<Option<Value>>;
}
