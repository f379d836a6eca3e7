//! Network seam for discovery and scanning.
//!
//! [`HttpFetcher`] talks to the real web; [`MemoryFetcher`] serves canned
//! responses for offline runs and tests.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};

use crate::error::FetchError;
use crate::sanitize::redact_url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches a page body as text.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches a full response body.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed fetcher with a bounded per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/pdf;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: redact_url(url),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: redact_url(url),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.send(url)
            .await?
            .text()
            .await
            .map_err(|e| FetchError::Request {
                url: redact_url(url),
                reason: format!("failed to read body: {}", e),
            })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bytes = self
            .send(url)
            .await?
            .bytes()
            .await
            .map_err(|e| FetchError::Request {
                url: redact_url(url),
                reason: format!("failed to read body: {}", e),
            })?;
        Ok(bytes.to_vec())
    }
}

/// Fetcher over a fixed URL → body map.
#[derive(Default)]
pub struct MemoryFetcher {
    bodies: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        let mut bodies = match self.bodies.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        bodies.insert(url.into(), body.into());
    }

    pub fn with(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.insert(url, body);
        self
    }

    fn lookup(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let bodies = match self.bodies.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self.lookup(url)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.lookup(url)
    }
}
