//! Error types for the telegram-poller crate.

/// Broad classification of a failed poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection failure or timeout reaching the server
    Transport,
    /// Non-200 status or a body that is not a Bot API envelope
    Protocol,
    /// The server answered with `ok: false`
    Application,
    /// The update handler failed while processing an update
    Callback,
}

/// Errors produced while fetching or delivering a single batch of updates.
///
/// None of these escape the polling loop. They are logged, counted in
/// [`PollStats`](crate::PollStats) and the next cycle is scheduled as usual.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// A network error occurred
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with something other than 200 OK
    #[error("Unexpected HTTP status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        body: String,
    },

    /// The body could not be decoded as a Bot API response
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The server reported an application-level error
    #[error("API error {error_code}: {description}")]
    Api {
        /// `error_code` field of the envelope
        error_code: i64,
        /// `description` field of the envelope
        description: String,
    },

    /// The update handler returned an error or panicked
    #[error("Update handler failed for update {update_id}: {message}")]
    Callback {
        /// Id of the update being handled
        update_id: i64,
        /// Error message or panic payload
        message: String,
    },
}

impl PollError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PollError::Transport(_) => ErrorKind::Transport,
            PollError::Status { .. } | PollError::Malformed(_) => ErrorKind::Protocol,
            PollError::Api { .. } => ErrorKind::Application,
            PollError::Callback { .. } => ErrorKind::Callback,
        }
    }
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the bot token.
        PollError::Transport(err.without_url().to_string())
    }
}

impl From<serde_json::Error> for PollError {
    fn from(err: serde_json::Error) -> Self {
        PollError::Malformed(err.to_string())
    }
}

/// Invalid [`PollingOptions`](crate::PollingOptions) or credentials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The bot token is empty
    #[error("Bot token must not be empty")]
    EmptyToken,

    /// The page-size limit is outside 1..=100
    #[error("Invalid limit {0}: must be between 1 and 100")]
    InvalidLimit(u32),

    /// The initial offset leaves no update id to request
    #[error("Invalid initial offset {0}: must be below i64::MAX")]
    InvalidOffset(i64),

    /// The API base URL cannot be parsed
    #[error("Invalid API URL '{url}': {reason}")]
    InvalidApiUrl {
        /// The rejected URL
        url: String,
        /// Parser message
        reason: String,
    },
}

/// Errors returned to the embedder when creating or joining a polling loop.
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No tokio runtime is available to drive the loop
    #[error("A polling loop must be created inside a tokio runtime")]
    NoRuntime,

    /// The HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// The loop task panicked or was aborted
    #[error("Failed to await polling task: {0}")]
    TaskJoin(String),
}

/// Result of fetching one batch of updates.
pub type PollResult<T> = std::result::Result<T, PollError>;

/// Convenience type alias for Results using PollerError.
pub type Result<T> = std::result::Result<T, PollerError>;
