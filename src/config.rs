//! Configuration file model
//!
//! An optional YAML file supplies `transport` and `http` sections. Every
//! field has a default, so an empty file (or no file) yields the stock
//! policy. Command-line flags are applied on top by the runner.
//!
//! ```yaml
//! transport:
//!   min_interval_seconds: 1.0
//!   max_retries: 3
//!   backoff:
//!     type: exponential
//!     base_ms: 1000
//!     max_ms: 60000
//!   rate_limit:
//!     low_watermark: 5
//!     high_watermark: 20
//! http:
//!   timeout_seconds: 30
//! ```

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimitPolicy, TransportConfig};
use crate::types::{BackoffType, StringMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete configuration loaded from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PagewalkConfig {
    /// Retry, pacing and quota policy
    #[serde(default)]
    pub transport: TransportSection,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSection,
}

impl PagewalkConfig {
    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::config(format!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                ))
            }
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        if t.max_retries == 0 {
            return Err(Error::invalid_value(
                "transport.max_retries",
                "must be at least 1",
            ));
        }
        if Duration::try_from_secs_f64(t.min_interval_seconds).is_err() {
            return Err(Error::invalid_value(
                "transport.min_interval_seconds",
                "must be a non-negative number of seconds",
            ));
        }
        if t.backoff.max_ms < t.backoff.base_ms {
            return Err(Error::invalid_value(
                "transport.backoff.max_ms",
                "must not be below base_ms",
            ));
        }

        let policy = &t.rate_limit;
        if policy.low_watermark > policy.high_watermark {
            return Err(Error::invalid_value(
                "transport.rate_limit.low_watermark",
                format!(
                    "{} is above high_watermark {}",
                    policy.low_watermark, policy.high_watermark
                ),
            ));
        }
        if policy.slowdown_multiplier <= 0.0 || !policy.slowdown_multiplier.is_finite() {
            return Err(Error::invalid_value(
                "transport.rate_limit.slowdown_multiplier",
                "must be positive",
            ));
        }

        if self.http.timeout_seconds == 0 {
            return Err(Error::invalid_value("http.timeout_seconds", "must be positive"));
        }
        Ok(())
    }

    /// Transport policy described by this config
    pub fn transport_config(&self) -> TransportConfig {
        let t = &self.transport;
        let mut builder = TransportConfig::builder()
            .backoff(
                t.backoff.backoff_type,
                Duration::from_millis(t.backoff.base_ms),
                Duration::from_millis(t.backoff.max_ms),
            )
            .max_retries(t.max_retries)
            .rate_limit(t.rate_limit.clone());

        builder = match Duration::try_from_secs_f64(t.min_interval_seconds) {
            Ok(interval) if !interval.is_zero() => builder.min_interval(interval),
            _ => builder.no_pacing(),
        };
        builder.build()
    }

    /// HTTP client settings described by this config
    pub fn http_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.http.timeout_seconds))
            .headers(self.http.headers.clone());
        if let Some(agent) = &self.http.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }
}

// ============================================================================
// Transport Section
// ============================================================================

/// Retry, pacing and quota policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    /// Minimum spacing between calls, 0 disables pacing
    #[serde(default = "default_min_interval")]
    pub min_interval_seconds: f64,

    /// Total attempts for network and server failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff
    #[serde(default)]
    pub backoff: BackoffSection,

    /// Quota watermarks
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            min_interval_seconds: default_min_interval(),
            max_retries: default_max_retries(),
            backoff: BackoffSection::default(),
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

fn default_min_interval() -> f64 {
    1.0
}

fn default_max_retries() -> u32 {
    3
}

/// Backoff configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackoffSection {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Base delay in milliseconds
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::default(),
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_base_ms() -> u64 {
    1000
}

fn default_max_ms() -> u64 {
    60_000
}

// ============================================================================
// HTTP Section
// ============================================================================

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSection {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: StringMap,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: None,
            headers: StringMap::new(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
