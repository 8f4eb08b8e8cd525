//! Error types for activity sources

use std::time::Duration;
use thiserror::Error;

/// Activity error type
#[derive(Error, Debug)]
pub enum Error {
    /// WebSocket transport or handshake error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Event registration error
    #[error("Event pipe error: {0}")]
    Pipe(#[from] event_pipe::Error),

    /// No new log lines arrived within the staleness timeout
    #[error("no new log lines for {elapsed:?}")]
    Stale {
        /// How long the log has been silent
        elapsed: Duration,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status of a rejected WebSocket handshake
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::WebSocket(tungstenite::Error::Http(response)) => Some(response.status().as_u16()),
            _ => None,
        }
    }

    /// Whether a failed connection attempt is worth repeating
    ///
    /// Client errors (bad credentials, unknown endpoint) will not go away
    /// by themselves; everything else might.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.status_code(), Some(400..=499))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
