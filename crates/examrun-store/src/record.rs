//! The record-store contract and its HTTP implementation.
//!
//! The backend is a generic JSON-record service speaking REST CRUD under
//! `/api/collections/{collection}/records`. Transport failures are
//! translated into the `StoreError` taxonomy at this boundary; nothing
//! above it ever sees an HTTP status code.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use examrun_core::error::StoreError;

use crate::config::BackendConfig;

const LIST_PAGE_SIZE: u32 = 500;

/// A raw backend record: identity plus an open field map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    /// Collection the record belongs to; needed to resolve file URLs.
    #[serde(rename = "collectionName", default)]
    pub collection: String,
    /// Server-side creation timestamp, as the backend formats it.
    #[serde(default)]
    pub created: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl RawRecord {
    /// A field as a trimmed string, when present and non-empty.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Trait over the persistence service. Implemented by [`HttpRecordStore`]
/// and the in-memory store in [`crate::memory`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_one(&self, collection: &str, id: &str) -> Result<RawRecord, StoreError>;

    /// List records matching a filter expression, in the given sort order
    /// (`-field` for descending).
    async fn get_list(
        &self,
        collection: &str,
        filter: &str,
        sort: &str,
    ) -> Result<Vec<RawRecord>, StoreError>;

    async fn create(&self, collection: &str, fields: Value) -> Result<RawRecord, StoreError>;

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<RawRecord, StoreError>;

    /// Turn a storage-relative filename on a record into a fetchable URL.
    /// Returns `None` for an empty filename.
    fn resolve_file_url(&self, record: &RawRecord, filename: &str) -> Option<String>;
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<RawRecord>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// reqwest-backed record store.
pub struct HttpRecordStore {
    base_url: String,
    auth_token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpRecordStore {
    pub fn new(config: &BackendConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        Ok(Self {
            base_url: config.server_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{collection}/records", self.base_url)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.header("Authorization", token),
            None => request,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout_secs)
        } else if e.is_request() && e.to_string().contains("canceled") {
            StoreError::Cancelled
        } else {
            StoreError::NetworkError(e.to_string())
        }
    }

    async fn check_status(
        response: reqwest::Response,
        collection: &str,
        id: &str,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status().as_u16();
        if status < 400 {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or(body);

        Err(match status {
            404 => StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            },
            400 => StoreError::Validation(message),
            _ => StoreError::ApiError { status, message },
        })
    }

    async fn parse_record(response: reqwest::Response) -> Result<RawRecord, StoreError> {
        response.json().await.map_err(|e| StoreError::ApiError {
            status: 0,
            message: format!("failed to parse record: {e}"),
        })
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    #[instrument(skip(self), fields(collection = %collection, id = %id))]
    async fn get_one(&self, collection: &str, id: &str) -> Result<RawRecord, StoreError> {
        let url = format!("{}/{id}", self.records_url(collection));
        let response = self
            .apply_auth(self.client.get(url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = Self::check_status(response, collection, id).await?;
        Self::parse_record(response).await
    }

    #[instrument(skip(self, filter), fields(collection = %collection))]
    async fn get_list(
        &self,
        collection: &str,
        filter: &str,
        sort: &str,
    ) -> Result<Vec<RawRecord>, StoreError> {
        let response = self
            .apply_auth(
                self.client.get(self.records_url(collection)).query(&[
                    ("filter", filter),
                    ("sort", sort),
                    ("perPage", &LIST_PAGE_SIZE.to_string()),
                ]),
            )
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = Self::check_status(response, collection, "").await?;

        let list: ListResponse = response.json().await.map_err(|e| StoreError::ApiError {
            status: 0,
            message: format!("failed to parse list: {e}"),
        })?;
        Ok(list.items)
    }

    #[instrument(skip(self, fields), fields(collection = %collection))]
    async fn create(&self, collection: &str, fields: Value) -> Result<RawRecord, StoreError> {
        let response = self
            .apply_auth(self.client.post(self.records_url(collection)).json(&fields))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = Self::check_status(response, collection, "").await?;
        Self::parse_record(response).await
    }

    #[instrument(skip(self, fields), fields(collection = %collection, id = %id))]
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<RawRecord, StoreError> {
        let url = format!("{}/{id}", self.records_url(collection));
        let response = self
            .apply_auth(self.client.patch(url).json(&fields))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let response = Self::check_status(response, collection, id).await?;
        Self::parse_record(response).await
    }

    fn resolve_file_url(&self, record: &RawRecord, filename: &str) -> Option<String> {
        if filename.is_empty() {
            return None;
        }
        Some(format!(
            "{}/api/files/{}/{}/{filename}",
            self.base_url, record.collection, record.id
        ))
    }
}
