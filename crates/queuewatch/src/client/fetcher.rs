use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::client::models::{normalize, QueueMapDto, QueueSnapshot};
use crate::error::FetchError;

/// Header carrying the static credential token.
const AUTH_HEADER: &str = "x-api-key";

/// Bodies longer than this are truncated before being surfaced in errors.
const MAX_ERROR_BODY_BYTES: usize = 512;

/// Source of queue snapshots, one call per poll cycle.
///
/// The poller depends only on this contract; production uses
/// [`JobServerClient`], tests substitute a scripted source.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<QueueSnapshot>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

/// HTTP client for the photo server's job-queue API.
///
/// The credential header is installed once at construction; rotating the
/// token means building a new client.
#[derive(Clone)]
pub struct JobServerClient {
    http: reqwest::Client,
    base_url: String,
}

impl JobServerClient {
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(token)
                .map_err(|_| FetchError::Transport("api token is not a valid header value".into()))?;
            headers.insert(AUTH_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Out-of-band connectivity check. Not part of the poll cycle.
    pub async fn ping(&self) -> Result<(), FetchError> {
        let resp = self.http.get(format!("{}/server/ping", self.base_url)).send().await?;
        check_status(resp).await.map(|_| ())
    }

    pub async fn pause_queue(&self, queue_name: &str) -> Result<(), FetchError> {
        self.post_empty(&format!("{}/jobs/{}/pause", self.base_url, queue_name)).await
    }

    pub async fn resume_queue(&self, queue_name: &str) -> Result<(), FetchError> {
        self.post_empty(&format!("{}/jobs/{}/resume", self.base_url, queue_name)).await
    }

    pub async fn retry_job(&self, job_id: &str) -> Result<(), FetchError> {
        self.post_empty(&format!("{}/jobs/{}/retry", self.base_url, job_id)).await
    }

    pub async fn cancel_job(&self, job_id: &str) -> Result<(), FetchError> {
        let resp = self
            .http
            .delete(format!("{}/jobs/{}/cancel", self.base_url, job_id))
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }

    async fn post_empty(&self, url: &str) -> Result<(), FetchError> {
        let resp = self.http.post(url).send().await?;
        check_status(resp).await.map(|_| ())
    }
}

#[async_trait]
impl SnapshotSource for JobServerClient {
    async fn fetch(&self) -> Result<Vec<QueueSnapshot>, FetchError> {
        let resp = self.http.get(format!("{}/jobs", self.base_url)).send().await?;
        let resp = check_status(resp).await?;
        let map: QueueMapDto = resp.json().await?;
        Ok(normalize(map))
    }
}

/// Turn a non-2xx response into a protocol error carrying the body text.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = read_error_body(resp).await;
    Err(FetchError::Protocol {
        status: status.as_u16(),
        body,
    })
}

async fn read_error_body(resp: reqwest::Response) -> Option<String> {
    let text = resp.text().await.ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut body = trimmed.to_string();
    if body.len() > MAX_ERROR_BODY_BYTES {
        let mut end = MAX_ERROR_BODY_BYTES;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    Some(body)
}
