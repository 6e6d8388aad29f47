use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the chat API client.
/// Nothing here is retried; every variant is handed straight back to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Cannot build request URL from base '{0}'")]
    InvalidUrl(String),

    // ── Stream setup errors ──────────────────────────────────────────────────
    #[error("Failed to stream message")]
    StreamFailed { status: StatusCode },

    #[error("No reader available")]
    NoReader,
}

impl ApiError {
    /// Status code of the failed exchange, when the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } | ApiError::StreamFailed { status } => Some(*status),
            ApiError::Http(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_stream_setup(&self) -> bool {
        matches!(self, ApiError::StreamFailed { .. } | ApiError::NoReader)
    }
}

/// Errors raised by the hosted-table client.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Table request on '{table}' failed: {status} - {body}")]
    Status {
        table: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to decode rows from '{table}': {source}")]
    Decode {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Write to '{table}' returned no rows")]
    NoRowsReturned { table: &'static str },

    #[error("Record not found: {table} with {column} = '{value}'")]
    NotFound {
        table: &'static str,
        column: String,
        value: String,
    },
}

impl DbError {
    pub fn not_found(table: &'static str, column: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::NotFound {
            table,
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

/// Startup configuration failures. These are fatal: the binary exits on them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be set")]
    Missing { var: &'static str },

    #[error("{var} cannot be empty")]
    Empty { var: &'static str },

    #[error("{var} is not a valid URL: '{value}'")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{var} must be a whole number of seconds, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Backend handle has already been initialised")]
    AlreadyInitialized,
}
