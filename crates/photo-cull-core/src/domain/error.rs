//! Error taxonomy.
//!
//! Per-item problems (`ValidationError`, `BackendError`) are captured into
//! the item's `ScoreResult` and never abort a batch. `PreconditionError` is
//! returned synchronously to the caller. `ResourceError` is surfaced as a
//! warning after the cache has been cleared.

use thiserror::Error;

use super::ItemId;

/// Top-level error type of the core crate.
#[derive(Debug, Error)]
pub enum CullError {
    /// An item or option failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A remote scoring call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Cache or memory pressure.
    #[error("resource error: {0}")]
    Resource(String),

    /// The orchestrator was used out of order.
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
}

/// Invalid item or invalid batch options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// File format not in the raster/RAW allow-list.
    #[error("unsupported file format '{0}'")]
    UnsupportedFormat(String),

    /// Required metadata is missing or zero.
    #[error("missing required metadata: {0}")]
    MissingMetadata(&'static str),

    /// An item id appears more than once in one batch.
    #[error("duplicate item id {0}")]
    DuplicateItem(ItemId),

    /// A batch option is out of range.
    #[error("invalid option {name}: {reason}")]
    InvalidOption {
        /// Option name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Failure of a call to the AI backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The call did not complete in time.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The backend could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend answered with an error status.
    #[error("backend returned HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The backend rejected the image itself.
    #[error("backend rejected input: {0}")]
    InvalidInput(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The capability is not provided by this assessor.
    #[error("{0} unavailable")]
    Unavailable(&'static str),
}

impl BackendError {
    /// Returns true for failures worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidInput(_) | Self::Malformed(_) | Self::Unavailable(_) => false,
        }
    }
}

/// Misuse of the orchestrator API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// A batch is already running on this orchestrator.
    #[error("batch {0} is still active")]
    BatchActive(u64),

    /// The handle does not refer to a batch of this orchestrator.
    #[error("unknown batch {0}")]
    UnknownBatch(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Timeout(1000).is_transient());
        assert!(BackendError::Connection("refused".into()).is_transient());
        assert!(BackendError::Http {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(BackendError::Http {
            status: 429,
            message: String::new()
        }
        .is_transient());
        assert!(!BackendError::Http {
            status: 404,
            message: String::new()
        }
        .is_transient());
        assert!(!BackendError::InvalidInput("bad".into()).is_transient());
        assert!(!BackendError::Malformed("eof".into()).is_transient());
        assert!(!BackendError::Unavailable("faces").is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = CullError::from(ValidationError::UnsupportedFormat("TXT".into()));
        assert_eq!(err.to_string(), "unsupported file format 'TXT'");

        let err = CullError::from(PreconditionError::BatchActive(3));
        assert_eq!(err.to_string(), "batch 3 is still active");
    }
}
