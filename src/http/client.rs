//! HTTP client with response classification
//!
//! Provides a thin HTTP client that handles:
//! - Default headers, base URL and timeouts from an immutable config
//! - Rate limit header extraction on every response
//! - Error classification for retry decisions
//!
//! Each call is a single attempt. Retries, backoff and rate limit waits
//! belong to [`Transport`](super::Transport).

use super::rate_limit::RateLimitInfo;
use crate::error::{Error, Result};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            default_headers: HashMap::new(),
            user_agent: format!("pagewalk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Add several default headers
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.config.default_headers.extend(headers);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters, sent in insertion order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A successful call's value together with the quota it reported
#[derive(Debug, Clone)]
pub struct Reply<T> {
    /// Decoded value
    pub value: T,
    /// Rate limit metadata, if the response carried any
    pub rate_limit: Option<RateLimitInfo>,
}

impl<T> Reply<T> {
    /// Wrap a value with no rate limit metadata
    pub fn new(value: T) -> Self {
        Self {
            value,
            rate_limit: None,
        }
    }

    /// Attach rate limit metadata
    #[must_use]
    pub fn with_rate_limit(mut self, info: RateLimitInfo) -> Self {
        self.rate_limit = Some(info);
        self
    }

    /// Transform the value, keeping the metadata
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            value: f(self.value),
            rate_limit: self.rate_limit,
        }
    }
}

/// HTTP client performing single classified attempts
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Self {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Make a single GET request and classify the outcome
    pub async fn get(&self, url: &str, config: RequestConfig) -> Result<Reply<Response>> {
        self.request(Method::GET, url, config).await
    }

    /// Make a GET request and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        config: RequestConfig,
    ) -> Result<Reply<T>> {
        let reply = self.get(url, config).await?;
        let rate_limit = reply.rate_limit;
        let text = reply
            .value
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response body: {e}")))?;
        let value = serde_json::from_str(&text)
            .map_err(|e| Error::malformed(format!("{url}: {e}")))?;
        Ok(Reply { value, rate_limit })
    }

    /// Make a GET request and return the body as text
    pub async fn get_text(&self, url: &str, config: RequestConfig) -> Result<Reply<String>> {
        let reply = self.get(url, config).await?;
        let rate_limit = reply.rate_limit;
        let value = reply
            .value
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response body: {e}")))?;
        Ok(Reply { value, rate_limit })
    }

    /// Make a single request of any method
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<Reply<Response>> {
        let full_url = self.build_url(url);

        let mut req = self.client.request(method.clone(), &full_url);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        for (key, value) in &config.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if !config.query.is_empty() {
            req = req.query(&config.query);
        }

        if let Some(timeout) = config.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::network(format!("Request timeout: {full_url}"))
            } else if e.is_connect() {
                Error::network(format!("Connection error: {full_url}: {e}"))
            } else {
                Error::Http(e)
            }
        })?;

        let rate_limit = RateLimitInfo::from_headers(response.headers());
        let status = response.status();

        if status.is_success() {
            debug!("Request succeeded: {} {}", method, full_url);
            return Ok(Reply {
                value: response,
                rate_limit,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &full_url, body, rate_limit))
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

/// Map a non-success status to the error taxonomy
fn classify_status(
    status: StatusCode,
    url: &str,
    body: String,
    rate_limit: Option<RateLimitInfo>,
) -> Error {
    if status == StatusCode::NOT_FOUND {
        return Error::not_found(url);
    }

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && body.to_lowercase().contains("rate limit"))
    {
        return Error::RateLimited {
            info: rate_limit.unwrap_or_default(),
        };
    }

    if status.is_server_error() {
        return Error::server_error(status.as_u16(), body);
    }

    Error::http_status(status.as_u16(), body)
}
