//! Update records and the Bot API response envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PollError, PollResult};

/// A single update returned by `getUpdates`.
///
/// The loop only looks at `update_id`. Everything else is kept verbatim in
/// `payload` and survives re-serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Monotonically increasing identifier assigned by the server
    pub update_id: i64,

    /// All remaining fields (`message`, `callback_query`, ...)
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Update {
    /// Create an update with an empty payload
    pub fn new(update_id: i64) -> Self {
        Self {
            update_id,
            payload: Map::new(),
        }
    }

    /// Attach a payload field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    /// Look up a payload field by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Name of the payload field; Bot API updates carry exactly one, naming the update type
    pub fn kind(&self) -> Option<&str> {
        self.payload.keys().next().map(String::as_str)
    }
}

/// The `{ ok, result, error_code, description }` envelope every Bot API method returns.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Turn the envelope into the method result or an application error
    pub fn into_result(self) -> PollResult<T> {
        if !self.ok {
            return Err(PollError::Api {
                error_code: self.error_code.unwrap_or_default(),
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        self.result
            .ok_or_else(|| PollError::Malformed("`ok` is true but `result` is missing".to_string()))
    }
}

/// Decode a `getUpdates` response body into the batch it carries.
pub fn parse_updates(body: &str) -> PollResult<Vec<Update>> {
    let envelope: ApiResponse<Vec<Update>> = serde_json::from_str(body)?;
    envelope.into_result()
}
