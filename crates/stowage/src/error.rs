//! Error types for stowage
//!
//! Every backend reports failures through [`StorageError`]. Native errors
//! (OS errno values, HTTP-like status codes from object stores) are turned
//! into this taxonomy by [`crate::translate`] before they reach a caller.

use std::fmt;
use thiserror::Error;

/// Status code carried over from the backend that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeStatus {
    /// Raw OS error number (`EEXIST`, `ENOENT`, ...)
    Errno(i32),
    /// HTTP-like status code reported by a remote store
    Http(u16),
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeStatus::Errno(code) => write!(f, "errno {}", code),
            NativeStatus::Http(code) => write!(f, "HTTP {}", code),
        }
    }
}

/// Semantic outcome of a failed storage operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    AlreadyExists,
    PermissionDenied,
    ContainmentViolation,
    NotSupported,
    InvalidArgument,
    Generic,
}

/// Storage errors shared by all backends
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        status: Option<NativeStatus>,
    },

    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        status: Option<NativeStatus>,
    },

    #[error("Already exists: {message}")]
    AlreadyExists {
        message: String,
        status: Option<NativeStatus>,
    },

    #[error("Permission denied: {message}")]
    PermissionDenied {
        message: String,
        status: Option<NativeStatus>,
    },

    /// A logical name resolved to a location outside the storage root
    #[error("Attempted access to '{name}' denied: path is outside of the storage root")]
    ContainmentViolation { name: String },

    #[error("The {backend} backend does not support {operation}")]
    NotSupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Anything the translator could not classify
    #[error("Storage backend error: {message}")]
    Generic {
        message: String,
        status: Option<NativeStatus>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            status: None,
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            status: None,
        }
    }

    pub fn containment(name: impl Into<String>) -> Self {
        Self::ContainmentViolation { name: name.into() }
    }

    pub fn not_supported(backend: &'static str, operation: &'static str) -> Self {
        Self::NotSupported { backend, operation }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// The semantic kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Conflict { .. } => ErrorKind::Conflict,
            StorageError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StorageError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            StorageError::ContainmentViolation { .. } => ErrorKind::ContainmentViolation,
            StorageError::NotSupported { .. } => ErrorKind::NotSupported,
            StorageError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            StorageError::Generic { .. } => ErrorKind::Generic,
        }
    }

    /// Native status reported by the backend, if there was one
    pub fn status(&self) -> Option<NativeStatus> {
        match self {
            StorageError::NotFound { status, .. }
            | StorageError::Conflict { status, .. }
            | StorageError::AlreadyExists { status, .. }
            | StorageError::PermissionDenied { status, .. }
            | StorageError::Generic { status, .. } => *status,
            _ => None,
        }
    }

    /// True for both `AlreadyExists` and `Conflict`.
    ///
    /// Filesystems report an existing entry through errno while object
    /// stores answer with a 409, and callers that treat "already there" as
    /// done should not need to care which one they got.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            StorageError::AlreadyExists { .. } | StorageError::Conflict { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Shorthand result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status() {
        let err = StorageError::AlreadyExists {
            message: "uploads/a.txt".into(),
            status: Some(NativeStatus::Errno(17)),
        };
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(err.status(), Some(NativeStatus::Errno(17)));
        assert!(err.is_already_exists());

        let err = StorageError::containment("../etc/passwd");
        assert_eq!(err.kind(), ErrorKind::ContainmentViolation);
        assert_eq!(err.status(), None);
        assert!(err.to_string().contains("../etc/passwd"));
    }

    #[test]
    fn test_conflict_counts_as_already_exists() {
        assert!(StorageError::conflict("bucket").is_already_exists());
        assert!(!StorageError::not_found("x").is_already_exists());
        assert!(StorageError::not_found("x").is_not_found());
    }

    #[test]
    fn test_native_status_display() {
        assert_eq!(NativeStatus::Errno(2).to_string(), "errno 2");
        assert_eq!(NativeStatus::Http(404).to_string(), "HTTP 404");
    }
}
