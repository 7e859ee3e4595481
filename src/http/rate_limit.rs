//! Rate limiting implementation
//!
//! Two mechanisms cooperate here:
//! - a governor-backed pacer that keeps a minimum interval between outbound calls
//! - a model of the server-reported quota (`RateLimitInfo`, `RateLimitState`) and the
//!   watermark policy deciding how long to hold off before the next call

use chrono::{DateTime, TimeZone, Utc};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Pacing
// ============================================================================

/// Configuration for call pacing
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Minimum interval between two outbound calls
    pub min_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }

    /// Create a config from a delay in fractional seconds
    ///
    /// Returns `None` for negative, non-finite or out-of-range delays.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        Duration::try_from_secs_f64(secs).ok().map(Self::new)
    }
}

/// Minimum-interval pacer for outbound calls
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    ///
    /// Returns `None` for a zero interval, which means "no pacing".
    pub fn new(config: &RateLimiterConfig) -> Option<Self> {
        let quota = Quota::with_period(config.min_interval)?
            .allow_burst(NonZeroU32::MIN);

        Some(Self {
            limiter: Arc::new(Governor::direct(quota)),
        })
    }

    /// Wait until a call can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

// ============================================================================
// Server-reported quota
// ============================================================================

/// Rate limit metadata read from a single response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitInfo {
    /// Calls left in the current window
    pub remaining: Option<u32>,
    /// Absolute time the window resets
    pub reset_at: Option<DateTime<Utc>>,
    /// Relative wait requested by the server
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Parse the usual `X-RateLimit-*` and `Retry-After` headers
    ///
    /// Returns `None` when the response carries none of them.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let remaining = header_str(headers, "x-ratelimit-remaining")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(|v| v.max(0.0) as u32);

        let reset_at = header_str(headers, "x-ratelimit-reset")
            .and_then(|s| s.trim().parse::<f64>().ok())
            .and_then(epoch_secs_to_datetime);

        let retry_after = header_str(headers, "retry-after")
            .or_else(|| header_str(headers, "x-ratelimit-reset-after"))
            .and_then(|s| s.trim().parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

        if remaining.is_none() && reset_at.is_none() && retry_after.is_none() {
            return None;
        }

        Some(Self {
            remaining,
            reset_at,
            retry_after,
        })
    }

    /// Time left until the server allows calls again
    pub fn wait_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        if let Some(reset_at) = self.reset_at {
            return Some((reset_at - now).to_std().unwrap_or(Duration::ZERO));
        }
        self.retry_after
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.remaining {
            Some(remaining) => write!(f, "remaining={remaining}")?,
            None => write!(f, "remaining=?")?,
        }
        if let Some(reset_at) = self.reset_at {
            write!(f, ", reset={}", reset_at.to_rfc3339())?;
        }
        if let Some(retry_after) = self.retry_after {
            write!(f, ", retry_after={retry_after:?}")?;
        }
        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn epoch_secs_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let millis = (secs * 1000.0).round() as i64;
    Utc.timestamp_millis_opt(millis).single()
}

/// Thresholds governing proactive and reactive waits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitPolicy {
    /// Below this many remaining calls, wait for the reset
    pub low_watermark: u32,
    /// Below this many remaining calls, slow down
    pub high_watermark: u32,
    /// Slowdown delay as a multiple of the base delay
    pub slowdown_multiplier: f64,
    /// Extra time added after the reported reset
    #[serde(with = "duration_secs")]
    pub reset_margin: Duration,
    /// Wait used when a rate-limited response carries no reset information
    #[serde(with = "duration_secs")]
    pub fallback_wait: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            low_watermark: 5,
            high_watermark: 20,
            slowdown_multiplier: 2.0,
            reset_margin: Duration::from_secs(10),
            fallback_wait: Duration::from_secs(60),
        }
    }
}

/// What to do before the next call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// Quota is fine
    Proceed,
    /// Quota is getting low, add a short delay
    Slowdown(Duration),
    /// Quota is nearly exhausted, wait for the reset
    UntilReset(Duration),
}

impl RateLimitPolicy {
    /// Decide how long to hold off after observing `info`
    pub fn throttle(&self, info: &RateLimitInfo, base_delay: Duration, now: DateTime<Utc>) -> Throttle {
        let Some(remaining) = info.remaining else {
            return Throttle::Proceed;
        };

        if remaining < self.low_watermark {
            let wait = info.wait_from(now).unwrap_or(Duration::ZERO) + self.reset_margin;
            return Throttle::UntilReset(wait);
        }

        if remaining < self.high_watermark {
            let delay = Duration::try_from_secs_f64(base_delay.as_secs_f64() * self.slowdown_multiplier)
                .unwrap_or(base_delay);
            return Throttle::Slowdown(delay);
        }

        Throttle::Proceed
    }

    /// Wait required after an explicit rate-limit response
    pub fn rate_limited_wait(&self, info: &RateLimitInfo, now: DateTime<Utc>) -> Duration {
        info.wait_from(now).unwrap_or(self.fallback_wait) + self.reset_margin
    }
}

/// Quota state carried from one call to the next
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitState {
    /// Last reported remaining budget
    pub remaining: Option<u32>,
    /// Last reported reset time
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitState {
    /// Fold a response's metadata into the state
    pub fn observe(&mut self, info: &RateLimitInfo) {
        if info.remaining.is_some() {
            self.remaining = info.remaining;
        }
        if info.reset_at.is_some() {
            self.reset_at = info.reset_at;
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom("duration must be a non-negative number of seconds")
        })
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.min_interval, Duration::from_secs(1));
        assert_eq!(
            RateLimiterConfig::from_secs_f64(1.5).map(|c| c.min_interval),
            Some(Duration::from_millis(1500))
        );
        assert!(RateLimiterConfig::from_secs_f64(-1.0).is_none());
        assert!(RateLimiterConfig::from_secs_f64(1e30).is_none());
    }

    #[test]
    fn test_rate_limiter_zero_interval_disables_pacing() {
        assert!(RateLimiter::new(&RateLimiterConfig::new(Duration::ZERO)).is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_single_permit() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(Duration::from_secs(60))).unwrap();
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_calls() {
        let limiter = RateLimiter::new(&RateLimiterConfig::new(Duration::from_millis(50))).unwrap();
        let start = std::time::Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_info_from_headers() {
        let info = RateLimitInfo::from_headers(&headers(&[
            ("x-ratelimit-remaining", "42"),
            ("x-ratelimit-reset", "1700000000"),
        ]))
        .unwrap();
        assert_eq!(info.remaining, Some(42));
        assert_eq!(info.reset_at.unwrap().timestamp(), 1_700_000_000);
        assert!(info.retry_after.is_none());
    }

    #[test]
    fn test_info_fractional_reset_and_retry_after() {
        let info = RateLimitInfo::from_headers(&headers(&[
            ("x-ratelimit-reset", "1700000000.250"),
            ("x-ratelimit-reset-after", "2.5"),
        ]))
        .unwrap();
        assert_eq!(info.reset_at.unwrap().timestamp_millis(), 1_700_000_000_250);
        assert_eq!(info.retry_after, Some(Duration::from_millis(2500)));
        assert!(info.remaining.is_none());
    }

    #[test]
    fn test_info_out_of_range_retry_after_is_ignored() {
        let info = RateLimitInfo::from_headers(&headers(&[
            ("x-ratelimit-remaining", "0"),
            ("retry-after", "1e30"),
        ]))
        .unwrap();
        assert_eq!(info.remaining, Some(0));
        assert!(info.retry_after.is_none());
    }

    #[test]
    fn test_info_absent_headers() {
        assert!(RateLimitInfo::from_headers(&HeaderMap::new()).is_none());
        assert!(RateLimitInfo::from_headers(&headers(&[("x-ratelimit-remaining", "lots")])).is_none());
    }

    #[test]
    fn test_policy_low_watermark_waits_for_reset() {
        let policy = RateLimitPolicy::default();
        let now = Utc::now();
        let info = RateLimitInfo {
            remaining: Some(2),
            reset_at: Some(now + chrono::Duration::seconds(30)),
            retry_after: None,
        };
        assert_eq!(
            policy.throttle(&info, Duration::from_secs(1), now),
            Throttle::UntilReset(Duration::from_secs(40))
        );
    }

    #[test]
    fn test_policy_reset_in_past_only_margin() {
        let policy = RateLimitPolicy::default();
        let now = Utc::now();
        let info = RateLimitInfo {
            remaining: Some(0),
            reset_at: Some(now - chrono::Duration::seconds(5)),
            retry_after: None,
        };
        assert_eq!(
            policy.throttle(&info, Duration::from_secs(1), now),
            Throttle::UntilReset(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_policy_high_watermark_slows_down() {
        let policy = RateLimitPolicy::default();
        let info = RateLimitInfo {
            remaining: Some(12),
            ..RateLimitInfo::default()
        };
        assert_eq!(
            policy.throttle(&info, Duration::from_secs(1), Utc::now()),
            Throttle::Slowdown(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_policy_ample_quota_proceeds() {
        let policy = RateLimitPolicy::default();
        let info = RateLimitInfo {
            remaining: Some(4000),
            ..RateLimitInfo::default()
        };
        assert_eq!(
            policy.throttle(&info, Duration::from_secs(1), Utc::now()),
            Throttle::Proceed
        );
        assert_eq!(
            policy.throttle(&RateLimitInfo::default(), Duration::from_secs(1), Utc::now()),
            Throttle::Proceed
        );
    }

    #[test]
    fn test_rate_limited_wait_fallback() {
        let policy = RateLimitPolicy::default();
        assert_eq!(
            policy.rate_limited_wait(&RateLimitInfo::default(), Utc::now()),
            Duration::from_secs(70)
        );

        let info = RateLimitInfo {
            retry_after: Some(Duration::from_secs(3)),
            ..RateLimitInfo::default()
        };
        assert_eq!(
            policy.rate_limited_wait(&info, Utc::now()),
            Duration::from_secs(13)
        );
    }

    #[test]
    fn test_state_observe_keeps_last_known() {
        let mut state = RateLimitState::default();
        state.observe(&RateLimitInfo {
            remaining: Some(10),
            reset_at: None,
            retry_after: None,
        });
        state.observe(&RateLimitInfo {
            remaining: None,
            reset_at: None,
            retry_after: Some(Duration::from_secs(1)),
        });
        assert_eq!(state.remaining, Some(10));
    }

    #[test]
    fn test_policy_serde_seconds() {
        let policy: RateLimitPolicy =
            serde_yaml::from_str("low_watermark: 3\nreset_margin: 2.5\n").unwrap();
        assert_eq!(policy.low_watermark, 3);
        assert_eq!(policy.high_watermark, 20);
        assert_eq!(policy.reset_margin, Duration::from_millis(2500));

        assert!(serde_yaml::from_str::<RateLimitPolicy>("reset_margin: 1.0e30\n").is_err());
        assert!(serde_yaml::from_str::<RateLimitPolicy>("fallback_wait: -1\n").is_err());
    }
}
