//! Error types for projection cache operations.
//!
//! A cache miss is not an error: [`crate::ProductProjectionRepository::find`]
//! returns `Ok(None)` for absent IDs. Everything in [`ProjectionError`] is a
//! condition the caller must be able to tell apart from "no data".

use std::time::Duration;

/// Error type for projection cache operations.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The backend could not be reached (connection refused, dropped, IO failure).
    #[error("Backend unavailable during {operation}: {reason}")]
    BackendUnavailable {
        /// Backend operation that failed (`get`, `mget`, `sadd`, ...)
        operation: &'static str,
        /// Underlying failure
        reason: String,
    },

    /// A backend call did not complete within the operation timeout.
    #[error("Backend {operation} timed out after {timeout:?}")]
    Timeout {
        /// Backend operation that timed out
        operation: &'static str,
        /// Timeout that was exceeded
        timeout: Duration,
    },

    /// The backend was reachable but rejected the command (e.g. wrong key type).
    #[error("Backend rejected {operation}: {reason}")]
    Backend {
        /// Backend operation that was rejected
        operation: &'static str,
        /// Error reported by the backend
        reason: String,
    },

    /// A stored record could not be decoded.
    #[error("Failed to decode record at '{key}': {reason}")]
    Decode {
        /// Backend key holding the record
        key: String,
        /// Decoder failure
        reason: String,
    },

    /// A projection could not be encoded for storage.
    #[error("Failed to encode projection {id}: {reason}")]
    Encode {
        /// Product ID of the projection
        id: i64,
        /// Encoder failure
        reason: String,
    },

    /// Invalid cache configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProjectionError {
    /// Build a [`ProjectionError::BackendUnavailable`].
    pub fn unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            operation,
            reason: reason.into(),
        }
    }

    /// Whether the error means the backend is degraded (unreachable or timing out).
    ///
    /// Callers at the HTTP boundary map these to a server error rather than
    /// a not-found response.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. } | Self::Timeout { .. })
    }

    /// Whether the error is a record decoding failure.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Name of the backend operation involved, if any.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::BackendUnavailable { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Backend { operation, .. } => Some(*operation),
            Self::Decode { .. } | Self::Encode { .. } | Self::Config(_) => None,
        }
    }
}

/// Result type for projection cache operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
