//! Job execution error types
//!
//! Wraps a job failure together with a flag telling the queue whether the
//! failure is recoverable (retry per policy) or unrecoverable (fail now).

use std::fmt;

use crate::error::{AppError, ErrorMetadata};

/// Job execution error that can be either recoverable or unrecoverable
#[derive(Debug)]
pub struct TaskError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl TaskError {
    /// Create a new unrecoverable task error
    ///
    /// Unrecoverable errors cause the job to fail immediately without retrying.
    /// Use this for errors like:
    /// - A target resource or source file that does not exist
    /// - Invalid payloads that won't change on retry
    /// - Missing configuration
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Create a new recoverable task error
    ///
    /// Recoverable errors are retried according to the job's retry policy.
    /// Use this for errors like:
    /// - Rejected or conflicting persistence writes
    /// - Temporary storage unavailability
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    /// Check if this error is recoverable (should be retried)
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Get the inner error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Consume self and return the inner error
    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for TaskError {
    /// Default conversion from anyhow::Error creates a recoverable error
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

impl From<AppError> for TaskError {
    /// Recoverability follows the error taxonomy (NotFound is permanent,
    /// persistence failures are retried).
    fn from(err: AppError) -> Self {
        let recoverable = err.is_recoverable();
        Self {
            inner: err.into(),
            recoverable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecoverable_error() {
        let err = TaskError::unrecoverable(anyhow::anyhow!("Missing target"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("Missing target"));
    }

    #[test]
    fn test_recoverable_error() {
        let err = TaskError::recoverable(anyhow::anyhow!("Write rejected"));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("Write rejected"));
    }

    #[test]
    fn test_from_anyhow() {
        let err: TaskError = anyhow::anyhow!("Some error").into();
        assert!(err.is_recoverable(), "Default should be recoverable");
    }

    #[test]
    fn test_from_app_error_follows_taxonomy() {
        let missing: TaskError = AppError::not_found("FileSet", "fs-1").into();
        assert!(!missing.is_recoverable());

        let conflict: TaskError = AppError::PersistenceConflict {
            id: "fs-1".to_string(),
            expected: 3,
            found: 4,
        }
        .into();
        assert!(conflict.is_recoverable());
    }
}
