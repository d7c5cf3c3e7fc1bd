//! Configuration types for the telegram-poller crate
//!
//! [`PollingOptions`] controls the timing of a [`PollingLoop`](crate::PollingLoop)
//! and where its requests go.

use std::time::Duration;

use crate::error::ConfigError;

/// Default Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_INTERVAL_MS: u64 = 300;
const DEFAULT_REQUEST_GRACE_SECS: u64 = 10;

/// Largest page size accepted by `getUpdates`.
pub const MAX_LIMIT: u32 = 100;

/// Options for a polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingOptions {
    /// Server-side long-poll wait, sent in whole seconds
    /// Default: 10 seconds
    pub timeout: Duration,

    /// Delay between the end of one cycle and the start of the next
    /// Default: 300 milliseconds
    pub interval: Duration,

    /// Maximum number of updates per batch, passed through to the server
    /// Default: None (server decides)
    pub limit: Option<u32>,

    /// Base URL of the Bot API server
    /// Default: https://api.telegram.org
    pub api_url: String,

    /// Extra time on top of `timeout` before the HTTP request is abandoned
    /// Default: 10 seconds
    pub request_grace: Duration,

    /// Offset the loop starts from; the first request asks for `initial_offset + 1`
    /// Default: 0
    pub initial_offset: i64,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            limit: None,
            api_url: DEFAULT_API_URL.to_string(),
            request_grace: Duration::from_secs(DEFAULT_REQUEST_GRACE_SECS),
            initial_offset: 0,
        }
    }
}

impl PollingOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create options from environment variables.
    ///
    /// Reads `TELEGRAM_POLL_TIMEOUT_SECS`, `TELEGRAM_POLL_INTERVAL_MS`,
    /// `TELEGRAM_POLL_LIMIT` and `TELEGRAM_API_URL`. Missing or unparsable
    /// values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let timeout = env_parse::<u64>("TELEGRAM_POLL_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let interval = env_parse::<u64>("TELEGRAM_POLL_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.interval);
        let limit = env_parse::<u32>("TELEGRAM_POLL_LIMIT").or(defaults.limit);
        let api_url = std::env::var("TELEGRAM_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.api_url);

        Self {
            timeout,
            interval,
            limit,
            api_url,
            ..defaults
        }
    }

    /// Validate the options and return the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_LIMIT {
                return Err(ConfigError::InvalidLimit(limit));
            }
        }

        if self.initial_offset == i64::MAX {
            return Err(ConfigError::InvalidOffset(self.initial_offset));
        }

        match url::Url::parse(&self.api_url) {
            Ok(url) if url.cannot_be_a_base() => Err(ConfigError::InvalidApiUrl {
                url: self.api_url.clone(),
                reason: "URL cannot be used as a base".to_string(),
            }),
            Ok(_) => Ok(()),
            Err(e) => Err(ConfigError::InvalidApiUrl {
                url: self.api_url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Timeout applied to each HTTP request: the long-poll wait plus the grace period
    pub fn request_timeout(&self) -> Duration {
        self.timeout + self.request_grace
    }

    /// Long-poll wait in whole seconds, as sent on the wire
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }

    // Builder pattern methods for fluent configuration

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_request_grace(mut self, grace: Duration) -> Self {
        self.request_grace = grace;
        self
    }

    pub fn with_initial_offset(mut self, offset: i64) -> Self {
        self.initial_offset = offset;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = PollingOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.interval, Duration::from_millis(300));
        assert_eq!(options.limit, None);
        assert_eq!(options.api_url, "https://api.telegram.org");
        assert_eq!(options.initial_offset, 0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let zero_limit = PollingOptions::new().with_limit(0);
        assert_eq!(zero_limit.validate(), Err(ConfigError::InvalidLimit(0)));

        let large_limit = PollingOptions::new().with_limit(101);
        assert_eq!(large_limit.validate(), Err(ConfigError::InvalidLimit(101)));

        let bad_url = PollingOptions::new().with_api_url("not a url");
        assert!(matches!(
            bad_url.validate(),
            Err(ConfigError::InvalidApiUrl { .. })
        ));

        let opaque_url = PollingOptions::new().with_api_url("mailto:bot@example.com");
        assert!(opaque_url.validate().is_err());

        let last_offset = PollingOptions::new().with_initial_offset(i64::MAX);
        assert_eq!(
            last_offset.validate(),
            Err(ConfigError::InvalidOffset(i64::MAX))
        );
    }

    #[test]
    fn test_zero_interval_is_valid() {
        let options = PollingOptions::new().with_interval(Duration::ZERO);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_from_env() {
        std::env::set_var("TELEGRAM_POLL_TIMEOUT_SECS", "25");
        std::env::set_var("TELEGRAM_POLL_INTERVAL_MS", "0");
        std::env::set_var("TELEGRAM_POLL_LIMIT", "not-a-number");
        std::env::set_var("TELEGRAM_API_URL", "http://localhost:8081");

        let options = PollingOptions::from_env();

        std::env::remove_var("TELEGRAM_POLL_TIMEOUT_SECS");
        std::env::remove_var("TELEGRAM_POLL_INTERVAL_MS");
        std::env::remove_var("TELEGRAM_POLL_LIMIT");
        std::env::remove_var("TELEGRAM_API_URL");

        assert_eq!(options.timeout, Duration::from_secs(25));
        assert_eq!(options.interval, Duration::ZERO);
        assert_eq!(options.limit, None);
        assert_eq!(options.api_url, "http://localhost:8081");
        assert_eq!(options.request_grace, Duration::from_secs(10));
    }

    #[test]
    fn test_builder_pattern() {
        let options = PollingOptions::new()
            .with_timeout(Duration::from_secs(30))
            .with_interval(Duration::from_millis(50))
            .with_limit(100)
            .with_api_url("http://127.0.0.1:8081")
            .with_request_grace(Duration::from_secs(2))
            .with_initial_offset(41);

        assert_eq!(options.timeout_secs(), 30);
        assert_eq!(options.interval, Duration::from_millis(50));
        assert_eq!(options.limit, Some(100));
        assert_eq!(options.api_url, "http://127.0.0.1:8081");
        assert_eq!(options.request_timeout(), Duration::from_secs(32));
        assert_eq!(options.initial_offset, 41);
        assert!(options.validate().is_ok());
    }
}
