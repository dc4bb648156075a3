// src/fetch/mod.rs

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{FETCH_TIMEOUT, USER_AGENT};

// ============================================================================
// Client Configuration
// ============================================================================

/// Headers and cookies sent with every request, plus the per-request deadline.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            timeout: FETCH_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("couldn't perform GET request to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unable to read the response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} did not complete within {after:?}")]
    Timeout { url: String, after: Duration },
}

// ============================================================================
// Fetch Client
// ============================================================================

/// Deadline-bounded GET against the portal.
#[derive(Clone)]
pub struct FetchClient {
    client: Client,
    headers: HeaderMap,
    timeout: Duration,
}

impl FetchClient {
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let invalid = || FetchError::InvalidHeader { name: name.clone() };
            let key = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(key, value);
        }

        // All cookies travel in a single header, `name=value; name=value`.
        if !config.cookies.is_empty() {
            let cookie = config
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            let value = HeaderValue::from_str(&cookie).map_err(|_| FetchError::InvalidHeader {
                name: COOKIE.to_string(),
            })?;
            headers.insert(COOKIE, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            headers,
            timeout: config.timeout,
        })
    }

    /// Returns the full body of `url`.
    ///
    /// The deadline covers both the request and the body read, so a slow
    /// body yields `FetchError::Timeout` and never a truncated page.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let request = async {
            let resp = self
                .client
                .get(url)
                .headers(self.headers.clone())
                .send()
                .await
                .map_err(|source| FetchError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = resp.status();
            if !status.is_success() {
                warn!(url, %status, "portal answered with a non-success status");
            }

            resp.text().await.map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => {
                if let Ok(body) = &result {
                    debug!(url, bytes = body.len(), "fetched page");
                }
                result
            }
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }),
        }
    }
}
