//! Table API client for a hosted PostgREST endpoint (`/rest/v1`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use vitrina_events::{ChangeBus, ChangeEvent, ChangeKind};

use crate::backend::TableBackend;
use crate::error::{classify_http_status, DataError, ErrorKind};
use crate::query::{Filter, Row, Select};

/// Error body returned by PostgREST on non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// HTTP client for the hosted table API.
///
/// Its change bus echoes writes made through this client. Notifications for
/// writes made elsewhere need the hosted realtime socket, which is not
/// bridged here.
#[derive(Debug)]
pub struct PostgrestBackend {
    client: reqwest::Client,
    rest_url: String,
    api_key: Option<String>,
    changes: ChangeBus,
}

impl PostgrestBackend {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DataError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataError::internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            rest_url: rest_url(base_url),
            api_key,
            changes: ChangeBus::default(),
        })
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.table_url(table))
            .header("Accept", "application/json")
            .header("Prefer", "return=representation");
        if let Some(key) = &self.api_key {
            builder = builder
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"));
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Vec<Row>, DataError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn rest_url(base_url: &str) -> String {
    format!("{}/rest/v1", base_url.trim_end_matches('/'))
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(Filter::to_param).collect()
}

fn transport_error(err: reqwest::Error) -> DataError {
    if err.is_decode() {
        DataError::internal(format!("undecodable response: {err}"))
    } else {
        DataError::transient(err.to_string())
    }
}

/// Translate a non-2xx response into the error taxonomy, keeping the
/// backend's own message verbatim.
pub fn status_error(status: u16, body: &str) -> DataError {
    let parsed: PostgrestErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed.message.unwrap_or_else(|| {
        if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            body.to_string()
        }
    });
    let code = parsed.code.unwrap_or_else(|| status.to_string());

    match classify_http_status(status) {
        ErrorKind::Transient => DataError::transient(message),
        ErrorKind::NotFound => DataError::not_found("resource", parsed.details.unwrap_or(message)),
        ErrorKind::Constraint => DataError::constraint(code, message),
        ErrorKind::Validation | ErrorKind::Internal => {
            DataError::internal(format!("HTTP {status}: {message}"))
        }
    }
}

#[async_trait]
impl TableBackend for PostgrestBackend {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    async fn select(&self, query: &Select) -> Result<Vec<Row>, DataError> {
        let builder = self
            .request(Method::GET, &query.table)
            .query(&query.query_params());
        self.send(builder).await
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, DataError> {
        let builder = self.request(Method::POST, table).json(&rows);
        let stored = self.send(builder).await?;
        if !stored.is_empty() {
            self.changes
                .publish(ChangeEvent::new(table, ChangeKind::Insert, stored.len()));
        }
        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        patch: Row,
        filters: &[Filter],
    ) -> Result<Vec<Row>, DataError> {
        let builder = self
            .request(Method::PATCH, table)
            .query(&filter_params(filters))
            .json(&patch);
        let updated = self.send(builder).await?;
        if !updated.is_empty() {
            self.changes
                .publish(ChangeEvent::new(table, ChangeKind::Update, updated.len()));
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, DataError> {
        let builder = self
            .request(Method::DELETE, table)
            .query(&filter_params(filters));
        let removed = self.send(builder).await?;
        if !removed.is_empty() {
            self.changes
                .publish(ChangeEvent::new(table, ChangeKind::Delete, removed.len()));
        }
        Ok(removed.len() as u64)
    }

    fn changes(&self) -> &ChangeBus {
        &self.changes
    }
}
