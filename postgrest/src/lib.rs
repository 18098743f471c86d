//! Minimal PostgREST data API client.
//!
//! This crate provides a focused client for the table operations a Supabase
//! (or any PostgREST) backend exposes: insert, filtered select, and filtered
//! delete. Rows travel as `serde_json::Value`; typed decoding is the
//! caller's concern.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when talking to the data API.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Store credentials not configured")]
    NoCredentials,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of an API-level failure, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Query-string builder for PostgREST filter expressions.
///
/// ```ignore
/// let rows = client
///     .select("messages", Query::new().eq("session_id", 5).order("id.asc"))
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict returned columns (`select=...`).
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    /// Equality filter (`column=eq.value`).
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Ordering expression, e.g. `id.asc` or `created_at.desc`.
    pub fn order(mut self, expr: &str) -> Self {
        self.params.push(("order".to_string(), expr.to_string()));
        self
    }

    /// Row limit.
    pub fn limit(mut self, n: usize) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// PostgREST client bound to one backend and API key.
#[derive(Clone)]
pub struct Postgrest {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Postgrest {
    /// Create a client for the given backend base URL (without `/rest/v1`).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Create a client from SUPABASE_URL and SUPABASE_KEY environment
    /// variables.
    pub fn from_env() -> Result<Self, Error> {
        let url = std::env::var("SUPABASE_URL").map_err(|_| Error::NoCredentials)?;
        let key = std::env::var("SUPABASE_KEY").map_err(|_| Error::NoCredentials)?;
        Ok(Self::new(url, key))
    }

    /// Insert one record, returning the stored representation.
    pub async fn insert(&self, table: &str, body: &Value) -> Result<Vec<Value>, Error> {
        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.build_headers(true)?)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::decode_rows(response).await
    }

    /// Select rows matching the query.
    pub async fn select(&self, table: &str, query: Query) -> Result<Vec<Value>, Error> {
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.build_headers(false)?)
            .query(query.params())
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::decode_rows(response).await
    }

    /// Delete rows matching the query, returning the deleted representations.
    pub async fn delete(&self, table: &str, query: Query) -> Result<Vec<Value>, Error> {
        let response = self
            .client
            .delete(self.table_url(table))
            .headers(self.build_headers(true)?)
            .query(query.params())
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::decode_rows(response).await
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn build_headers(&self, return_representation: bool) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        if return_representation {
            headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        }
        Ok(headers)
    }

    async fn decode_rows(response: reqwest::Response) -> Result<Vec<Value>, Error> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;
        Ok(rows)
    }
}
