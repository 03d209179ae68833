//! Error types for pingworld-client.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pingworld-client.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ───────────────────────────────────────────────────────
    /// No session stored - log in or sign up first.
    #[error("Not authenticated - log in or sign up first")]
    NotAuthenticated,

    /// Session refresh failed. Credentials have been purged.
    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    // ── API ──────────────────────────────────────────────────────────────────
    /// API returned a non-success response.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        message: String,
    },

    /// Request could not be built (bad header value, unsupported method).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Storage ──────────────────────────────────────────────────────────────
    /// Storage I/O error.
    #[error("Storage I/O error at {path}: {message}")]
    StorageIo {
        /// Path that caused the error.
        path: PathBuf,
        /// Error description.
        message: String,
    },

    /// Storage serialization error.
    #[error("Storage serialization error: {0}")]
    StorageSerialization(String),

    /// Keyring backend error.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// Generic storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    /// Network/HTTP error. No response was received.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,
}

/// Maximum length of a response body kept in [`Error::Api`].
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl Error {
    /// Returns true if this error means the user has to log in again.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::NotAuthenticated | Error::RefreshFailed(_) | Error::Api { status: 401, .. }
        )
    }

    /// Returns true for a 401 response.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Api { status: 401, .. })
    }

    /// Creates an API error from a status and raw body.
    #[must_use]
    pub fn api(status: u16, body: &str) -> Self {
        let message = if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        };
        Self::Api { status, message }
    }

    /// Creates a storage I/O error.
    #[must_use]
    pub fn storage_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StorageIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Maps a transport error, keeping timeouts distinct.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err)
        }
    }
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, Error>;
