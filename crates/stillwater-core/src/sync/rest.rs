//! PostgREST-style remote backend over HTTPS.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::error::{SyncError, SyncResultOf};
use super::remote::RemoteBackend;
use crate::config::RemoteConfig;
use crate::util::{compact_text, millis_to_rfc3339};

#[derive(Clone)]
pub struct RestRemoteBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for RestRemoteBackend {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RestRemoteBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RestRemoteBackend {
    pub fn new(config: &RemoteConfig, request_timeout: Duration) -> SyncResultOf<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn table_url(&self, collection: &str) -> String {
        table_url(&self.base_url, collection)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }

    async fn fetch_rows(&self, url: String) -> SyncResultOf<Vec<Value>> {
        let response = self.authorize(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }
        Ok(response.json::<Vec<Value>>().await?)
    }
}

impl RemoteBackend for RestRemoteBackend {
    async fn upsert(&self, collection: &str, payload: Value) -> SyncResultOf<String> {
        let url = format!("{}?on_conflict=id", self.table_url(collection));
        let response = self
            .authorize(self.client.post(url))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let rows = response.json::<Vec<Value>>().await?;
        rows.first()
            .or(Some(&payload))
            .and_then(|row| row.get("id"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| SyncError::InvalidPayload("upsert response has no id".to_string()))
    }

    async fn query_by_owner_modified_after(
        &self,
        collection: &str,
        user_id: &str,
        since_ms: i64,
        offset: usize,
        limit: usize,
    ) -> SyncResultOf<Vec<Value>> {
        let url = delta_url(&self.base_url, collection, user_id, since_ms, offset, limit);
        self.fetch_rows(url).await
    }

    async fn query_by_id(
        &self,
        collection: &str,
        user_id: &str,
        id: &str,
    ) -> SyncResultOf<Option<Value>> {
        let rows = self
            .fetch_rows(row_url(&self.base_url, collection, user_id, id))
            .await?;
        Ok(rows.into_iter().next())
    }
}

fn table_url(base_url: &str, collection: &str) -> String {
    format!("{base_url}/rest/v1/{}", urlencoding::encode(collection))
}

fn row_url(base_url: &str, collection: &str, user_id: &str, id: &str) -> String {
    format!(
        "{}?user_id=eq.{}&id=eq.{}&limit=1",
        table_url(base_url, collection),
        urlencoding::encode(user_id),
        urlencoding::encode(id)
    )
}

fn delta_url(
    base_url: &str,
    collection: &str,
    user_id: &str,
    since_ms: i64,
    offset: usize,
    limit: usize,
) -> String {
    format!(
        "{}?user_id=eq.{}&last_modified=gt.{}&order=last_modified.desc,id.asc&offset={offset}&limit={limit}",
        table_url(base_url, collection),
        urlencoding::encode(user_id),
        urlencoding::encode(&millis_to_rfc3339(since_ms))
    )
}

#[derive(Debug, Deserialize)]
struct RestErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<RestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

/// Rejections of the row itself are terminal; everything else is retried
fn status_error(status: StatusCode, body: &str) -> SyncError {
    let message = parse_api_error(status, body);
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::NOT_FOUND
        | StatusCode::CONFLICT
        | StatusCode::UNPROCESSABLE_ENTITY => SyncError::Validation(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SyncError::Timeout,
        _ => SyncError::Network(message),
    }
}
