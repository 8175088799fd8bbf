// src/error.rs

//! Unified error handling for collectors, stores and the pipeline runner.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Coarse failure classes used for operator diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credential or invalid configuration, detected before any fetch.
    Configuration,
    /// Connection, timeout or HTTP status failure.
    Transport,
    /// Response body could not be interpreted.
    Shape,
    /// Destination store unavailable or rejected a write.
    Store,
    /// Child process or task could not be run to completion.
    Orchestration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transport => "transport",
            ErrorKind::Shape => "shape",
            ErrorKind::Store => "store",
            ErrorKind::Orchestration => "orchestration",
        };
        f.write_str(label)
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed before a status was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {status} from {context}: {snippet}")]
    HttpStatus {
        context: String,
        status: u16,
        snippet: String,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Required credentials absent from the environment
    #[error("Missing credentials for {collector}: {}", names.join(", "))]
    MissingCredential {
        collector: String,
        names: Vec<String>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Response body did not have the structure the collector relies on
    #[error("Unexpected structure in {context}: {message}")]
    Structure { context: String, message: String },

    /// Persistent store error
    #[error("Store error: {0}")]
    Store(String),

    /// Postgres driver error
    #[cfg(feature = "postgres")]
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Collector process or task error
    #[error("Pipeline error for {collector}: {message}")]
    Pipeline { collector: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a structural (shape) error with context.
    pub fn structure(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Structure {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::Store(message.to_string())
    }

    /// Create a pipeline error for a named collector.
    pub fn pipeline(collector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Pipeline {
            collector: collector.into(),
            message: message.to_string(),
        }
    }

    /// Classify the error for diagnostics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::MissingCredential { .. }
            | AppError::Config(_)
            | AppError::Toml(_)
            | AppError::Selector { .. }
            | AppError::Url(_) => ErrorKind::Configuration,
            AppError::Http(e) if e.is_decode() => ErrorKind::Shape,
            AppError::Http(_) | AppError::HttpStatus { .. } => ErrorKind::Transport,
            AppError::Json(_) | AppError::Structure { .. } => ErrorKind::Shape,
            AppError::Store(_) | AppError::Io(_) => ErrorKind::Store,
            #[cfg(feature = "postgres")]
            AppError::Postgres(_) => ErrorKind::Store,
            AppError::Pipeline { .. } => ErrorKind::Orchestration,
        }
    }

    /// Hint printed next to authentication failures.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AppError::HttpStatus { status: 401 | 403, .. })
    }
}
