//! Error types for kindle2readwise.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 5=auth, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kindle2readwise operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    StorageError,
    DatabaseLocked,

    // Not Found (exit 3)
    SessionNotFound,
    HighlightNotFound,
    ClippingsFileNotFound,

    // Validation (exit 4)
    InvalidArgument,
    SessionAlreadyFinalized,

    // Authentication (exit 5)
    AuthenticationFailed,
    MissingToken,

    // Network (exit 6)
    RateLimited,
    NetworkError,
    PayloadRejected,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::StorageError => "STORAGE_ERROR",
            Self::DatabaseLocked => "DATABASE_LOCKED",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::HighlightNotFound => "HIGHLIGHT_NOT_FOUND",
            Self::ClippingsFileNotFound => "CLIPPINGS_FILE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::SessionAlreadyFinalized => "SESSION_ALREADY_FINALIZED",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::MissingToken => "MISSING_TOKEN",
            Self::RateLimited => "RATE_LIMITED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::PayloadRejected => "PAYLOAD_REJECTED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::StorageError | Self::DatabaseLocked => 2,
            Self::SessionNotFound | Self::HighlightNotFound | Self::ClippingsFileNotFound => 3,
            Self::InvalidArgument | Self::SessionAlreadyFinalized => 4,
            Self::AuthenticationFailed | Self::MissingToken => 5,
            Self::RateLimited | Self::NetworkError | Self::PayloadRejected => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in kindle2readwise operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Clippings file not found: {}", path.display())]
    ClippingsFileNotFound { path: PathBuf },

    #[error("Export session not found: {id}")]
    SessionNotFound { id: i64 },

    #[error("Highlight not found: {id}")]
    HighlightNotFound { id: i64 },

    #[error("Export session {id} is already finalized")]
    SessionAlreadyFinalized { id: i64 },

    #[error("Readwise authentication failed (HTTP 401): check your API token")]
    Authentication,

    #[error("No Readwise API token provided")]
    MissingToken,

    #[error("Readwise rate limit exceeded after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("Network error talking to Readwise: {0}")]
    Network(String),

    #[error("Readwise rejected the payload (HTTP {status}): {body}")]
    PayloadRejected { status: u16, body: String },

    #[error("Another process holds the database lock: {0}")]
    DatabaseLocked(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        // Lock contention is a reported fatal condition, not a generic DB error.
        if let rusqlite::Error::SqliteFailure(code, ref msg) = e {
            if matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return Self::DatabaseLocked(msg.clone().unwrap_or_else(|| code.to_string()));
            }
        }
        Self::Database(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ClippingsFileNotFound { .. } => ErrorCode::ClippingsFileNotFound,
            Self::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            Self::HighlightNotFound { .. } => ErrorCode::HighlightNotFound,
            Self::SessionAlreadyFinalized { .. } => ErrorCode::SessionAlreadyFinalized,
            Self::Authentication => ErrorCode::AuthenticationFailed,
            Self::MissingToken => ErrorCode::MissingToken,
            Self::RateLimitExhausted { .. } => ErrorCode::RateLimited,
            Self::Network(_) => ErrorCode::NetworkError,
            Self::PayloadRejected { .. } => ErrorCode::PayloadRejected,
            Self::DatabaseLocked(_) => ErrorCode::DatabaseLocked,
            Self::Database(_) => ErrorCode::StorageError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ClippingsFileNotFound { path } => Some(format!(
                "No file at {}. Plug in your Kindle and pass the path to 'My Clippings.txt'.",
                path.display()
            )),
            Self::MissingToken => Some(
                "Pass --token or set the READWISE_TOKEN environment variable.\n  \
                 Get a token at https://readwise.io/access_token"
                    .to_string(),
            ),
            Self::Authentication => Some(
                "The token was rejected by Readwise. Generate a fresh one at \
                 https://readwise.io/access_token"
                    .to_string(),
            ),
            Self::DatabaseLocked(_) => Some(
                "Another export run appears to be active against this database. \
                 Wait for it to finish and try again."
                    .to_string(),
            ),
            Self::SessionNotFound { id } => Some(format!(
                "No export session with ID {id}. Use `k2r history` to list sessions."
            )),
            Self::HighlightNotFound { id } => Some(format!(
                "No highlight with ID {id}. Use `k2r highlights list` to browse."
            )),
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(Error::Authentication.exit_code(), 5);
        assert_eq!(Error::DatabaseLocked("busy".into()).exit_code(), 2);
        assert_eq!(Error::SessionNotFound { id: 7 }.exit_code(), 3);
        assert_eq!(Error::MissingToken.exit_code(), 5);
        assert_eq!(Error::Other("boom".into()).exit_code(), 1);
    }

    #[test]
    fn structured_json_includes_code_and_hint() {
        let err = Error::MissingToken;
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "MISSING_TOKEN");
        assert!(
            json["error"]["hint"]
                .as_str()
                .unwrap()
                .contains("READWISE_TOKEN")
        );
    }

    #[test]
    fn busy_sqlite_error_maps_to_locked() {
        let e = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        );
        let err = Error::from(e);
        assert_eq!(err.error_code(), ErrorCode::DatabaseLocked);
    }
}
