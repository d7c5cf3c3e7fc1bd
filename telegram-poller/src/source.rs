//! Sources of update batches
//!
//! The polling loop talks to the server through the [`UpdateSource`] trait.
//! [`HttpUpdateSource`] is the real `getUpdates` client; tests substitute
//! scripted sources.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::config::PollingOptions;
use crate::error::{ConfigError, PollError, PollResult, PollerError};
use crate::update::{parse_updates, Update};

/// Longest slice of an error body kept in [`PollError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Parameters of one `getUpdates` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatesRequest {
    /// First update id wanted, i.e. the acknowledged offset plus one
    pub offset: i64,
    /// Server-side long-poll wait
    pub timeout: Duration,
    /// Optional page size
    pub limit: Option<u32>,
}

impl UpdatesRequest {
    /// Request everything after the acknowledged `offset`
    pub fn after(offset: i64, options: &PollingOptions) -> Self {
        Self {
            offset: offset.saturating_add(1),
            timeout: options.timeout,
            limit: options.limit,
        }
    }

    /// Query string pairs in the order they are sent
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("offset", self.offset.to_string()),
            ("timeout", self.timeout.as_secs().to_string()),
        ];
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Trait for anything that can answer a `getUpdates` request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetch the next batch of updates, in server order
    async fn get_updates(&self, request: &UpdatesRequest) -> PollResult<Vec<Update>>;
}

/// `getUpdates` over HTTPS
#[derive(Clone)]
pub struct HttpUpdateSource {
    client: reqwest::Client,
    endpoint: Url,
    redacted_endpoint: String,
}

impl HttpUpdateSource {
    /// Create a source for `token` against `options.api_url`
    pub fn new(token: &str, options: &PollingOptions) -> Result<Self, PollerError> {
        options.validate()?;
        let endpoint = endpoint_url(&options.api_url, token)?;
        let redacted_endpoint = endpoint_url(&options.api_url, "REDACTED")
            .map(|url| url.to_string())
            .unwrap_or_default();

        let client = reqwest::Client::builder()
            .timeout(options.request_timeout())
            .build()
            .map_err(|e| PollerError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            redacted_endpoint,
        })
    }

    /// Endpoint with the token masked, safe for logs
    pub fn redacted_endpoint(&self) -> &str {
        &self.redacted_endpoint
    }
}

impl fmt::Debug for HttpUpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpUpdateSource")
            .field("endpoint", &self.redacted_endpoint)
            .finish()
    }
}

#[async_trait]
impl UpdateSource for HttpUpdateSource {
    async fn get_updates(&self, request: &UpdatesRequest) -> PollResult<Vec<Update>> {
        tracing::trace!(
            endpoint = %self.redacted_endpoint,
            offset = request.offset,
            timeout_secs = request.timeout.as_secs(),
            limit = ?request.limit,
            "Sending getUpdates"
        );

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&request.query_pairs())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(PollError::Status {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        parse_updates(&body)
    }
}

/// Build `{api_url}/bot{token}/getUpdates`, keeping any path prefix of `api_url`
pub fn endpoint_url(api_url: &str, token: &str) -> Result<Url, ConfigError> {
    if token.trim().is_empty() {
        return Err(ConfigError::EmptyToken);
    }

    let mut url = Url::parse(api_url).map_err(|e| ConfigError::InvalidApiUrl {
        url: api_url.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidApiUrl {
            url: api_url.to_string(),
            reason: "URL cannot be used as a base".to_string(),
        });
    }

    let path = format!("{}/bot{}/getUpdates", url.path().trim_end_matches('/'), token);
    url.set_path(&path);
    url.set_query(None);
    Ok(url)
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
