//! Rate-limited transport
//!
//! Wraps single call attempts with:
//! - minimum spacing between outbound calls (including retries)
//! - proactive slowdown and reset waits driven by reported quota
//! - free retries on explicit rate limiting
//! - bounded exponential backoff on network and server errors
//!
//! A `Transport` is owned by exactly one run and is driven sequentially.

use super::client::Reply;
use super::rate_limit::{RateLimitPolicy, RateLimitState, RateLimiter, RateLimiterConfig, Throttle};
use crate::error::{Error, Result, TransportErrorKind};
use crate::pagination::{FetchOutcome, PageRequest, PageSource};
use crate::types::BackoffType;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Immutable transport policy threaded through every call
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Minimum spacing between outbound calls, `None` disables pacing
    pub pacing: Option<RateLimiterConfig>,
    /// Base delay for backoff and slowdown
    pub base_delay: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Maximum attempts for network and server failures
    pub max_retries: u32,
    /// Watermark policy for reported quota
    pub rate_limit: RateLimitPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pacing: Some(RateLimiterConfig::default()),
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            max_retries: 3,
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

impl TransportConfig {
    /// Create a new config builder
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }

    /// Calculate backoff delay for a given attempt (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.base_delay,
            BackoffType::Linear => self.base_delay.saturating_mul(attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.base_delay.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }
}

/// Builder for transport config
#[derive(Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Set the minimum interval between calls
    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.config.pacing = Some(RateLimiterConfig::new(interval));
        self
    }

    /// Disable call pacing
    pub fn no_pacing(mut self) -> Self {
        self.config.pacing = None;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, base: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.base_delay = base;
        self.config.max_backoff = max;
        self
    }

    /// Set max attempts for transient failures
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set rate limit policy
    pub fn rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.config.rate_limit = policy;
        self
    }

    /// Build the config
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Outbound attempts, retries included
    pub calls: u64,
    /// Backoff retries after network or server errors
    pub retries: u64,
    /// Waits caused by explicit rate limiting or exhausted quota
    pub rate_limit_waits: u64,
    /// Proactive slowdowns on low quota
    pub slowdowns: u64,
    /// Calls that failed for good (retries exhausted or terminal error)
    pub failures: u64,
    /// Calls answered with not-found
    pub not_found: u64,
}

/// Sequential call executor enforcing the transport policy
#[derive(Debug)]
pub struct Transport {
    config: TransportConfig,
    pacer: Option<RateLimiter>,
    state: RateLimitState,
    stats: TransportStats,
}

impl Transport {
    /// Create a transport from its policy
    pub fn new(config: TransportConfig) -> Self {
        let pacer = config.pacing.as_ref().and_then(RateLimiter::new);
        Self {
            config,
            pacer,
            state: RateLimitState::default(),
            stats: TransportStats::default(),
        }
    }

    /// Transport policy
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Last observed quota
    pub fn rate_limit_state(&self) -> &RateLimitState {
        &self.state
    }

    /// Counters so far
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    /// Run one logical call through the policy
    ///
    /// `attempt_fn` performs a single attempt. It is invoked again after rate
    /// limit waits (not counted against the retry budget) and after backoff on
    /// retryable failures. Not-found and other terminal errors return at once.
    pub async fn execute<T, F, Fut>(&mut self, label: &str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Reply<T>>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0u32;

        loop {
            if let Some(pacer) = &self.pacer {
                pacer.wait().await;
            }
            self.stats.calls += 1;

            match attempt_fn().await {
                Ok(reply) => {
                    if let Some(info) = &reply.rate_limit {
                        self.state.observe(info);
                        self.throttle(label, info).await;
                    }
                    return Ok(reply.value);
                }
                Err(Error::RateLimited { info }) => {
                    self.state.observe(&info);
                    let wait = self.config.rate_limit.rate_limited_wait(&info, Utc::now());
                    self.stats.rate_limit_waits += 1;
                    warn!("{label}: rate limited ({info}), sleeping {wait:?} before retrying");
                    tokio::time::sleep(wait).await;
                }
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        self.stats.failures += 1;
                        warn!("{label}: failed after {attempt} attempts: {e}");
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }
                    let delay = self.config.backoff(attempt - 1);
                    self.stats.retries += 1;
                    warn!("{label}: {e}, retrying in {delay:?} ({attempt}/{max_attempts})");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.kind() == Some(TransportErrorKind::NotFound) {
                        self.stats.not_found += 1;
                        debug!("{label}: {e}");
                    } else {
                        self.stats.failures += 1;
                        warn!("{label}: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Fetch one page, folding every failure into a tagged outcome
    pub async fn fetch_page<S: PageSource>(
        &mut self,
        source: &S,
        request: &PageRequest,
    ) -> FetchOutcome<S::Record> {
        let label = format!("{} [{}]", source.name(), request.cursor);
        match self.execute(&label, || source.fetch(request)).await {
            Ok(records) => FetchOutcome::from_records(records, request.limit),
            Err(e) => FetchOutcome::Failed(e.kind().unwrap_or(TransportErrorKind::Network)),
        }
    }

    /// Hold off according to the quota a successful response reported
    async fn throttle(&mut self, label: &str, info: &super::RateLimitInfo) {
        match self
            .config
            .rate_limit
            .throttle(info, self.config.base_delay, Utc::now())
        {
            Throttle::Proceed => {}
            Throttle::Slowdown(delay) => {
                self.stats.slowdowns += 1;
                debug!("{label}: quota getting low ({info}), adding {delay:?} delay");
                tokio::time::sleep(delay).await;
            }
            Throttle::UntilReset(wait) => {
                self.stats.rate_limit_waits += 1;
                warn!("{label}: quota nearly exhausted ({info}), sleeping {wait:?} until reset");
                tokio::time::sleep(wait).await;
            }
        }
    }
}
