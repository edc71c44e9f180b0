//! Translation of backend-native failures into [`StorageError`]
//!
//! This is the only place where OS errors and status codes are looked at.
//! Backends wrap each native call with [`TranslateExt::translate_err`] so
//! nothing above the backend layer ever handles a native error type.

use std::io;

use crate::error::{NativeStatus, StorageError};

/// A failure as reported by the native storage primitive
#[derive(Debug)]
pub enum NativeError {
    /// Failure from the operating system
    Io(io::Error),
    /// HTTP-like status code from a remote store
    Status { code: u16, message: String },
    /// Failure without any status information
    Other { message: String },
}

impl NativeError {
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<io::Error> for NativeError {
    fn from(error: io::Error) -> Self {
        NativeError::Io(error)
    }
}

/// Map a native failure onto the shared taxonomy.
///
/// `context` names what was being accessed, usually the logical name, and
/// is prefixed to the native message.
pub fn translate(native: impl Into<NativeError>, context: &str) -> StorageError {
    match native.into() {
        NativeError::Io(error) => translate_io(error, context),
        NativeError::Status { code, message } => translate_status(code, message, context),
        NativeError::Other { message } => StorageError::Generic {
            message: format!("{}: {}", context, message),
            status: None,
            source: None,
        },
    }
}

fn translate_io(error: io::Error, context: &str) -> StorageError {
    let message = format!("{}: {}", context, error);
    let status = error.raw_os_error().map(NativeStatus::Errno);
    match error.kind() {
        io::ErrorKind::AlreadyExists => StorageError::AlreadyExists { message, status },
        io::ErrorKind::NotFound => StorageError::NotFound { message, status },
        io::ErrorKind::PermissionDenied => StorageError::PermissionDenied { message, status },
        _ => StorageError::Generic {
            message,
            status,
            source: Some(Box::new(error)),
        },
    }
}

fn translate_status(code: u16, message: String, context: &str) -> StorageError {
    let message = format!("{}: {}", context, message);
    let status = Some(NativeStatus::Http(code));
    match code {
        404 => StorageError::NotFound { message, status },
        409 => StorageError::Conflict { message, status },
        401 | 403 => StorageError::PermissionDenied { message, status },
        _ => StorageError::Generic {
            message,
            status,
            source: None,
        },
    }
}

/// Adds `translate_err` to results carrying a native error
pub trait TranslateExt<T> {
    fn translate_err(self, context: &str) -> crate::Result<T>;
}

impl<T, E: Into<NativeError>> TranslateExt<T> for std::result::Result<T, E> {
    fn translate_err(self, context: &str) -> crate::Result<T> {
        self.map_err(|error| translate(error, context))
    }
}
