use serde_json::Value as JsonValue;
use thiserror::Error;

pub type LoadResult<T> = Result<T, DataSourceError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataSourceError {
    #[error("Data source '{0}' is not registered")]
    NotFound(String),

    #[error("No request handler registered for type '{0}'")]
    UnknownType(String),

    #[error("Fetch for '{0}' gated: shouldFetch returned false")]
    Gated(String),

    #[error("Invalid request options: {0}")]
    InvalidOptions(String),

    #[error("Request failed with status {status} {status_text}")]
    Transport {
        status: u16,
        status_text: String,
        body: Option<JsonValue>,
    },

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Handler failed: {0}")]
    Handler(String),
}

impl DataSourceError {
    /// Short form written into the scope-visible `error` field.
    pub fn scope_message(&self) -> String {
        self.to_string()
    }
}
