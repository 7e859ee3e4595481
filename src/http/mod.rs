//! HTTP transport module
//!
//! Provides the HTTP client, rate limiting and the retrying transport.
//!
//! # Features
//!
//! - **Response Classification**: Not found, rate limited, network, server error, malformed
//! - **Pacing**: Minimum interval between calls using governor
//! - **Quota Awareness**: Slowdown and reset waits from `X-RateLimit-*` headers
//! - **Backoff Strategies**: Constant, linear, and exponential backoff

mod client;
mod rate_limit;
mod transport;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, Reply, RequestConfig};
pub use rate_limit::{
    RateLimitInfo, RateLimitPolicy, RateLimitState, RateLimiter, RateLimiterConfig, Throttle,
};
pub use transport::{Transport, TransportConfig, TransportConfigBuilder, TransportStats};
