use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults;

/// Client configuration
///
/// Everything the transport and cache need to talk to one remote service.
/// Built with `Default` plus the `with_*` builder methods; the CLI fills it
/// from arguments and environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the remote service (no trailing slash needed)
    pub base_url: String,

    /// Path of the event stream, appended to `base_url`
    pub sse_path: String,

    /// Per-call timeout (milliseconds)
    pub request_timeout_ms: u64,

    /// TCP connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    /// Retry settings for transport failures
    pub retry: RetryPolicy,

    /// Lifetime of cached results (seconds)
    pub cache_ttl_secs: u64,

    /// Reject stream responses whose id differs from the request id.
    /// Off by default: some servers do not echo ids reliably.
    pub strict_id_matching: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::DEFAULT_SERVER_URL.to_string(),
            sse_path: defaults::DEFAULT_SSE_PATH.to_string(),
            request_timeout_ms: defaults::DEFAULT_REQUEST_TIMEOUT_MS,
            connect_timeout_ms: defaults::DEFAULT_CONNECT_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            cache_ttl_secs: defaults::DEFAULT_CACHE_TTL_SECS,
            strict_id_matching: false,
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given server with defaults elsewhere
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_strict_id_matching(mut self, strict: bool) -> Self {
        self.strict_id_matching = strict;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Full URL of the event stream
    pub fn sse_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.sse_path)
    }

    /// Full URL for a negotiated session endpoint.
    ///
    /// Absolute endpoints are used as-is; paths are joined onto `base_url`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if endpoint.starts_with('/') {
            format!("{base}{endpoint}")
        } else {
            format!("{base}/{endpoint}")
        }
    }
}

/// Retry settings: attempt budget and exponential backoff bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt (milliseconds)
    pub base_delay_ms: u64,
    /// Upper bound for any single delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: defaults::DEFAULT_BASE_DELAY_MS,
            max_delay_ms: defaults::DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_attempts_floor() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.attempts(), 1);
        assert_eq!(RetryPolicy::no_retry().attempts(), 1);
    }

    #[test]
    fn test_urls() {
        let config = ClientConfig::new("http://localhost:3845/");
        assert_eq!(config.sse_url(), "http://localhost:3845/sse");
        assert_eq!(
            config.endpoint_url("/messages?sessionId=1"),
            "http://localhost:3845/messages?sessionId=1"
        );
        assert_eq!(
            config.endpoint_url("messages"),
            "http://localhost:3845/messages"
        );
        assert_eq!(
            config.endpoint_url("https://other.host/rpc"),
            "https://other.host/rpc"
        );
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"base_url":"http://x","retry":{"max_attempts":5}}"#)
                .unwrap();
        assert_eq!(config.base_url, "http://x");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, defaults::DEFAULT_BASE_DELAY_MS);
        assert_eq!(config.request_timeout_ms, defaults::DEFAULT_REQUEST_TIMEOUT_MS);
    }
}
