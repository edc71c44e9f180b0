//! Storage configuration
//!
//! The root location is always part of the configuration and is handed to
//! the backend constructor explicitly; nothing in the library looks it up
//! on its own.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{FileSystemBackend, MemoryBackend};
use crate::error::StorageError;
use crate::resolver::NameResolver;
use crate::storage::Storage;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {var} - {reason}")]
    Environment { var: String, reason: String },

    #[error("Invalid configuration: {setting} - {reason}")]
    InvalidConfig { setting: String, reason: String },

    #[error("Storage initialization failed: {0}")]
    Storage(#[from] StorageError),
}

/// Which backend to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Filesystem,
    Memory,
    S3,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "filesystem" | "fs" | "local" => Ok(BackendKind::Filesystem),
            "memory" | "mem" => Ok(BackendKind::Memory),
            "s3" => Ok(BackendKind::S3),
            other => Err(ConfigError::InvalidConfig {
                setting: "backend".to_string(),
                reason: format!("unknown backend '{}'", other),
            }),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Filesystem => write!(f, "filesystem"),
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::S3 => write!(f, "s3"),
        }
    }
}

/// Connection settings for S3-compatible stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Endpoint URL, e.g. `http://localhost:9000`
    pub endpoint: String,

    pub bucket: String,

    pub access_key: String,

    #[serde(skip_serializing)]
    pub secret_key: String,

    /// Key prefix inside the bucket acting as the root
    #[serde(default)]
    pub prefix: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend to use
    #[serde(default)]
    pub backend: BackendKind,

    /// Root directory (filesystem) or key namespace (memory)
    pub root: PathBuf,

    /// Prefix for public URLs
    pub base_url: String,

    /// Cap on numbered name candidates; unbounded when absent
    #[serde(default)]
    pub max_name_attempts: Option<u32>,

    #[serde(default)]
    pub s3: Option<S3Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Filesystem,
            root: PathBuf::from("uploads"),
            base_url: "/uploads".to_string(),
            max_name_attempts: None,
            s3: None,
        }
    }
}

fn required_var(var: &str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|e| ConfigError::Environment {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

impl StorageConfig {
    pub fn filesystem(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Filesystem,
            root: root.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn memory(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Memory,
            root: root.into(),
            base_url: "memory://".to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// - `STOWAGE_BACKEND` (`filesystem`, `memory` or `s3`; default `filesystem`)
    /// - `STOWAGE_ROOT` (default `uploads`)
    /// - `STOWAGE_BASE_URL` (default `/uploads`)
    /// - `STOWAGE_MAX_NAME_ATTEMPTS` (optional)
    ///
    /// For the `s3` backend additionally `S3_ENDPOINT_URL`, `S3_BUCKET`,
    /// `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY` and optionally `S3_PREFIX`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match std::env::var("STOWAGE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.backend,
        };

        let max_name_attempts = match std::env::var("STOWAGE_MAX_NAME_ATTEMPTS") {
            Ok(value) => Some(value.parse().map_err(|_| ConfigError::InvalidConfig {
                setting: "STOWAGE_MAX_NAME_ATTEMPTS".to_string(),
                reason: format!("'{}' is not a number", value),
            })?),
            Err(_) => None,
        };

        let s3 = if backend == BackendKind::S3 {
            Some(S3Config {
                endpoint: required_var("S3_ENDPOINT_URL")?,
                bucket: required_var("S3_BUCKET")?,
                access_key: required_var("S3_ACCESS_KEY_ID")?,
                secret_key: required_var("S3_SECRET_ACCESS_KEY")?,
                prefix: std::env::var("S3_PREFIX").unwrap_or_default(),
            })
        } else {
            None
        };

        Ok(Self {
            backend,
            root: std::env::var("STOWAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
            base_url: std::env::var("STOWAGE_BASE_URL").unwrap_or(defaults.base_url),
            max_name_attempts,
            s3,
        })
    }

    fn resolver(&self) -> NameResolver {
        match self.max_name_attempts {
            Some(attempts) => NameResolver::with_max_attempts(attempts),
            None => NameResolver::unbounded(),
        }
    }

    /// Build a [`Storage`] for this configuration
    pub fn build(&self) -> Result<Storage, ConfigError> {
        let storage = match self.backend {
            BackendKind::Filesystem => {
                Storage::new(FileSystemBackend::new(&self.root, &self.base_url)?)
            }
            BackendKind::Memory => Storage::new(
                MemoryBackend::new(self.root.to_string_lossy()).with_base_url(&self.base_url),
            ),
            BackendKind::S3 => self.build_s3()?,
        };
        Ok(storage.with_resolver(self.resolver()))
    }

    #[cfg(feature = "s3")]
    fn build_s3(&self) -> Result<Storage, ConfigError> {
        let s3 = self.s3.as_ref().ok_or_else(|| ConfigError::InvalidConfig {
            setting: "s3".to_string(),
            reason: "the s3 backend needs S3 connection settings".to_string(),
        })?;
        let base_url = Some(self.base_url.as_str()).filter(|url| !url.is_empty());
        let backend = crate::backend::S3Backend::from_config(s3, base_url)?;
        Ok(Storage::new(backend))
    }

    #[cfg(not(feature = "s3"))]
    fn build_s3(&self) -> Result<Storage, ConfigError> {
        Err(ConfigError::InvalidConfig {
            setting: "backend".to_string(),
            reason: "stowage was built without the `s3` feature".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("fs".parse::<BackendKind>().unwrap(), BackendKind::Filesystem);
        assert_eq!("Memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("s3".parse::<BackendKind>().unwrap(), BackendKind::S3);
        assert!("ftp".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Filesystem.to_string(), "filesystem");
    }

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, BackendKind::Filesystem);
        assert_eq!(config.root, PathBuf::from("uploads"));
        assert_eq!(config.base_url, "/uploads");
        assert!(config.max_name_attempts.is_none());
    }

    #[test]
    fn test_build_memory_with_attempt_cap() {
        let mut config = StorageConfig::memory("bucket");
        config.max_name_attempts = Some(5);
        let storage = config.build().unwrap();
        assert_eq!(storage.backend().kind(), "memory");
        assert!(format!("{:?}", storage).contains("max_attempts: Some(5)"));
    }

    #[test]
    fn test_build_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig::filesystem(dir.path(), "/files").build().unwrap();
        assert_eq!(storage.backend().kind(), "filesystem");
        assert_eq!(storage.url("a b.txt").unwrap(), "/files/a%20b.txt");
    }

    #[cfg(not(feature = "s3"))]
    #[test]
    fn test_s3_requires_feature() {
        let config = StorageConfig {
            backend: BackendKind::S3,
            ..StorageConfig::default()
        };
        assert!(matches!(
            config.build(),
            Err(ConfigError::InvalidConfig { .. })
        ));
    }
}
