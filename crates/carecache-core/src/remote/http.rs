//! HTTP client for the school's JSON document API.
//!
//! Endpoints, relative to the base URL:
//! - `GET    {collection}`           all documents
//! - `GET    {collection}/{id}`      one document (404 means absent)
//! - `POST   {collection}:query`     filtered read, body is a `Query`
//! - `POST   {collection}`           create, answers `{"id": ...}`
//! - `PATCH  {collection}/{id}`      merge a partial document
//! - `DELETE {collection}/{id}`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, Response, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::RemoteError;
use super::query::Query;
use super::store::{Document, DocumentStore};

/// HTTP request timeout in seconds.
/// 30s allows for slow mobile networks while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// How long to back off after each 429 before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RATE_LIMIT_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), or `None` once exhausted.
    /// Doubles on every attempt.
    fn backoff(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }
        Some(self.initial_backoff * 2u32.pow(retry - 1))
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

/// List endpoints answer either a bare array or `{"documents": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<Document>),
    Wrapped { documents: Vec<Document> },
}

impl ListResponse {
    fn into_documents(self) -> Vec<Document> {
        match self {
            ListResponse::Bare(docs) => docs,
            ListResponse::Wrapped { documents } => documents,
        }
    }
}

/// Remote document store over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: Client,
    base_url: Url,
    token: Option<String>,
    retry: RetryPolicy,
}

impl HttpDocumentStore {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| RemoteError::InvalidRequest(format!("Invalid base URL {}: {}", base_url, e)))?;
        if parsed.cannot_be_a_base() {
            return Err(RemoteError::InvalidRequest(format!(
                "Base URL cannot carry a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: parsed,
            token: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                RemoteError::InvalidRequest(format!("Base URL cannot carry a path: {}", self.base_url))
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    /// Any other non-success status becomes a `RemoteError`.
    async fn execute(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
    ) -> Result<Response, RemoteError> {
        let mut retries = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .header(header::ACCEPT, "application/json");
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                let Some(delay) = self.retry.backoff(retries) else {
                    return Err(RemoteError::RateLimited);
                };
                warn!(url = %url, retry = retries, ?delay, "Rate limited, backing off");
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::from_status(status, &body));
        }
    }

    async fn parse<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T, RemoteError> {
        response.json().await.map_err(|e| {
            RemoteError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn read_all(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        let url = self.url(&[collection])?;
        let response = self.execute(Method::GET, &url, None).await?;
        let list: ListResponse = Self::parse(response, &url).await?;
        let docs = list.into_documents();
        debug!(collection = collection, count = docs.len(), "Fetched collection");
        Ok(docs)
    }

    async fn read_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RemoteError> {
        let url = self.url(&[collection, id])?;
        match self.execute(Method::GET, &url, None).await {
            Ok(response) => Ok(Some(Self::parse(response, &url).await?)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, RemoteError> {
        let segment = format!("{}:query", collection);
        let url = self.url(&[segment.as_str()])?;
        let body = serde_json::to_value(query)
            .map_err(|e| RemoteError::InvalidRequest(format!("Failed to encode query: {}", e)))?;
        let response = self.execute(Method::POST, &url, Some(&body)).await?;
        let list: ListResponse = Self::parse(response, &url).await?;
        Ok(list.into_documents())
    }

    async fn create(&self, collection: &str, data: Document) -> Result<String, RemoteError> {
        let url = self.url(&[collection])?;
        let response = self.execute(Method::POST, &url, Some(&data)).await?;
        let created: CreatedResponse = Self::parse(response, &url).await?;
        Ok(created.id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> Result<(), RemoteError> {
        let url = self.url(&[collection, id])?;
        self.execute(Method::PATCH, &url, Some(&partial)).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let url = self.url(&[collection, id])?;
        self.execute(Method::DELETE, &url, None).await?;
        Ok(())
    }
}
