//! Error types for the speech I/O subsystem

use thiserror::Error;

/// Result type alias for speech subsystem operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the speech I/O subsystem
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Input rejected before any network or device access
    #[error("validation error: {0}")]
    Validation(String),

    /// Audio device error (microphone or output unavailable/denied)
    #[error("audio device error: {0}")]
    Audio(String),

    /// Speech recognition error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech synthesis error
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Operation queue error
    #[error("queue error: {0}")]
    Queue(String),

    /// Remote endpoint returned a non-success status
    #[error("remote endpoint error {status}: {body}")]
    RemoteStatus {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether this failure is worth retrying.
    ///
    /// Transient failures drive Operation Queue backoff and recognition
    /// reconnection. Everything else is terminal for the operation that
    /// produced it: validation and device errors are surfaced immediately,
    /// never retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::RemoteStatus { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_transient() {
        let e = Error::RemoteStatus {
            status: 429,
            body: String::new(),
        };
        assert!(e.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        for status in [500, 502, 503, 599] {
            let e = Error::RemoteStatus {
                status,
                body: String::new(),
            };
            assert!(e.is_transient(), "status {status}");
        }
    }

    #[test]
    fn client_errors_are_terminal() {
        for status in [400, 401, 403, 404, 422] {
            let e = Error::RemoteStatus {
                status,
                body: String::new(),
            };
            assert!(!e.is_transient(), "status {status}");
        }
    }

    #[test]
    fn validation_is_terminal() {
        assert!(!Error::Validation("empty text".to_string()).is_transient());
    }

    #[test]
    fn device_failure_is_terminal() {
        assert!(!Error::Audio("microphone denied".to_string()).is_transient());
    }
}
