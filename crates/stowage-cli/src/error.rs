//! Error handling for the command line front end

use stowage::{ConfigError, StorageError};
use thiserror::Error;

/// Result type for CLI commands
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Storage(e) if e.is_not_found() => 3,
            CliError::Storage(_) => 1,
            CliError::Config(_) | CliError::InvalidInput(_) => 2,
            CliError::Io(_) | CliError::Serialization(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let missing = CliError::from(StorageError::not_found("gone.txt"));
        assert_eq!(missing.exit_code(), 3);

        let invalid = CliError::InvalidInput("nothing to upload".to_string());
        assert_eq!(invalid.exit_code(), 2);
        assert_eq!(invalid.to_string(), "Invalid input: nothing to upload");
    }
}
