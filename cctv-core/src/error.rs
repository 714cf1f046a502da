//! Error types for the CCTV streaming core.
//!
//! The streaming path itself never surfaces errors to the user: refused
//! sends, unready sources and lost connections are ordinary outcomes.
//! `StreamError` covers the places where failure is a real answer:
//! configuration, footage loading and the batch query.

use thiserror::Error;

/// The canonical error type for the streaming core.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Configuration Errors ─────────────────────────────────────
    /// A configuration value is outside its accepted range.
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    // ── Query Errors ─────────────────────────────────────────────
    /// The snapshot endpoint could not be reached or answered badly.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The snapshot response was not the expected JSON document.
    #[error("invalid snapshot response: {0}")]
    Json(#[from] serde_json::Error),

    /// A snapshot entry was not valid base64.
    #[error("invalid snapshot encoding: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Filesystem I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        StreamError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = StreamError::config("sample_rate_hz", "must be positive");
        assert!(e.to_string().contains("sample_rate_hz"));
        assert!(e.to_string().contains("must be positive"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no footage");
        let e: StreamError = io_err.into();
        assert!(matches!(e, StreamError::Io(_)));
    }

    #[test]
    fn from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: StreamError = json_err.into();
        assert!(e.to_string().starts_with("invalid snapshot response"));
    }
}
