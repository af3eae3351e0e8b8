//! Error types module
//!
//! This module provides the error taxonomy shared by the ingest pipeline. All
//! failures a job can surface are unified under [`AppError`], and every variant
//! maps onto an [`ErrorKind`] so callers (the job queue in particular) can make
//! retry decisions without matching on individual variants:
//!
//! - **NotFound**: the referenced resource, payload or source file does not exist.
//!   Permanent; never retried.
//! - **Persistence**: a write failed or was rejected (including optimistic-lock
//!   conflicts). Retryable.
//! - **Characterization** / **Derivative**: non-fatal to the surrounding job.
//!   These are absorbed and reported, never raised past a job boundary.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like missing resources
    Debug,
    /// Warning level - for degraded but recoverable outcomes
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Coarse classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Persistence,
    Storage,
    Characterization,
    Derivative,
    Queue,
    InvalidInput,
    Configuration,
    Internal,
}

/// Describes how an error should be treated by whoever receives it.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "NOT_FOUND")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("No {use_tag} file on file set {file_set_id}")]
    SourceNotFound {
        file_set_id: String,
        use_tag: String,
    },

    #[error("Persistence conflict on {id}: expected lock version {expected}, found {found}")]
    PersistenceConflict {
        id: String,
        expected: i64,
        found: i64,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Characterization failed: {0}")]
    Characterization(String),

    #[error("Derivative generation failed: {0}")]
    Derivative(String),

    #[error("Job queue error: {0}")]
    Queue(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound { .. } | AppError::SourceNotFound { .. } => ErrorKind::NotFound,
            AppError::PersistenceConflict { .. } | AppError::Persistence(_) => {
                ErrorKind::Persistence
            }
            AppError::Storage(_) => ErrorKind::Storage,
            AppError::Characterization(_) => ErrorKind::Characterization,
            AppError::Derivative(_) => ErrorKind::Derivative,
            AppError::Queue(_) => ErrorKind::Queue,
            AppError::InvalidInput(_) => ErrorKind::InvalidInput,
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::Internal(_) | AppError::InternalWithSource { .. } => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Storage => "storage",
            ErrorKind::Characterization => "characterization",
            ErrorKind::Derivative => "derivative",
            ErrorKind::Queue => "queue",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata per variant: (error_code, recoverable, log_level).
fn app_error_static_metadata(err: &AppError) -> (&'static str, bool, LogLevel) {
    match err {
        AppError::NotFound { .. } => ("NOT_FOUND", false, LogLevel::Debug),
        AppError::SourceNotFound { .. } => ("SOURCE_NOT_FOUND", false, LogLevel::Debug),
        AppError::PersistenceConflict { .. } => ("PERSISTENCE_CONFLICT", true, LogLevel::Warn),
        AppError::Persistence(_) => ("PERSISTENCE_ERROR", true, LogLevel::Error),
        AppError::Storage(_) => ("STORAGE_ERROR", true, LogLevel::Error),
        AppError::Characterization(_) => ("CHARACTERIZATION_FAILED", false, LogLevel::Warn),
        AppError::Derivative(_) => ("DERIVATIVE_FAILED", false, LogLevel::Warn),
        AppError::Queue(_) => ("QUEUE_ERROR", true, LogLevel::Error),
        AppError::InvalidInput(_) => ("INVALID_INPUT", false, LogLevel::Debug),
        AppError::Configuration(_) => ("CONFIGURATION_ERROR", false, LogLevel::Error),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => {
            ("INTERNAL_ERROR", true, LogLevel::Error)
        }
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_permanent() {
        let err = AppError::not_found("FileSet", "abc");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_recoverable());
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "FileSet not found: abc");
    }

    #[test]
    fn test_source_not_found_shares_not_found_kind() {
        let err = AppError::SourceNotFound {
            file_set_id: "fs-1".to_string(),
            use_tag: "original_file".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_persistence_errors_are_retryable() {
        let conflict = AppError::PersistenceConflict {
            id: "fs-1".to_string(),
            expected: 1,
            found: 2,
        };
        assert_eq!(conflict.kind(), ErrorKind::Persistence);
        assert!(conflict.is_recoverable());
        assert_eq!(conflict.log_level(), LogLevel::Warn);

        let write = AppError::Persistence("disk full".to_string());
        assert!(write.is_recoverable());
        assert_eq!(write.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_non_fatal_kinds() {
        assert_eq!(
            AppError::Characterization("x".into()).kind(),
            ErrorKind::Characterization
        );
        assert_eq!(AppError::Derivative("x".into()).kind(), ErrorKind::Derivative);
    }

    #[test]
    fn test_anyhow_conversion_keeps_message() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(matches!(
            err,
            AppError::InternalWithSource { ref message, .. } if message == "boom"
        ));
    }
}
