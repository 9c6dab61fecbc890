//! Error types for pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that external collaborators and the pipeline report for one item.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    /// The item's content is malformed or unusable.
    #[error("Content error: {reason}")]
    Content { reason: String },

    /// The backend could not be reached or refused the request.
    #[error("Backend unavailable during {operation}: {message}")]
    BackendUnavailable { operation: String, message: String },

    /// The backend did not answer in time.
    #[error("Backend timed out during {operation} after {timeout:?}")]
    BackendTimeout { operation: String, timeout: Duration },

    /// Work was refused because the run is stopping.
    #[error("Cancelled: {reason}")]
    Cancelled { reason: String },

    /// An invariant was violated (e.g. the operation panicked).
    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl StageError {
    /// Creates a content error.
    pub fn content(reason: impl Into<String>) -> Self {
        Self::Content {
            reason: reason.into(),
        }
    }

    /// Creates a backend-unavailable error.
    pub fn backend_unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a backend-timeout error.
    pub fn backend_timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::BackendTimeout {
            operation: operation.into(),
            timeout,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Content { .. } => ErrorKind::Content,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::BackendTimeout { .. } => ErrorKind::BackendTimeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a caller-level retry could plausibly succeed.
    ///
    /// The pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable { .. } | Self::BackendTimeout { .. }
        )
    }
}

/// Serializable classification of a [`StageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Content,
    BackendUnavailable,
    BackendTimeout,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::BackendUnavailable => "backend_unavailable",
            Self::BackendTimeout => "backend_timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(StageError::content("empty").kind(), ErrorKind::Content);
        assert_eq!(
            StageError::backend_unavailable("analyze", "connection refused").kind(),
            ErrorKind::BackendUnavailable
        );
        assert_eq!(
            StageError::backend_timeout("suggest", Duration::from_secs(5)).kind(),
            ErrorKind::BackendTimeout
        );
        assert_eq!(StageError::cancelled("stopped").kind(), ErrorKind::Cancelled);
        assert_eq!(StageError::internal("panic").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_display() {
        let err = StageError::backend_unavailable("analyze", "connection refused");
        assert_eq!(
            err.to_string(),
            "Backend unavailable during analyze: connection refused"
        );

        let err = StageError::backend_timeout("compare", Duration::from_secs(2));
        assert_eq!(err.to_string(), "Backend timed out during compare after 2s");
    }

    #[test]
    fn test_retryable() {
        assert!(StageError::backend_timeout("analyze", Duration::from_secs(1)).is_retryable());
        assert!(!StageError::content("binary data").is_retryable());
        assert!(!StageError::internal("lost").is_retryable());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::BackendUnavailable).unwrap();
        assert_eq!(json, "\"backend_unavailable\"");
        assert_eq!(ErrorKind::Cancelled.to_string(), "cancelled");
    }
}
