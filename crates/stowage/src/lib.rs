//! # Stowage
//!
//! Pluggable file storage: save, open, list and delete named files on a
//! local filesystem, in memory, or in an S3-compatible object store through
//! one interface.
//!
//! Every backend shares three guarantees:
//! - **Containment**: a logical name never resolves outside the configured
//!   root. Attempts fail with [`StorageError::ContainmentViolation`] before
//!   any I/O happens.
//! - **Collision-free saves**: saving `report.pdf` where it already exists
//!   stores `report_1.pdf`, then `report_2.pdf`, and so on.
//! - **One error taxonomy**: OS errors and object store status codes are
//!   translated into [`StorageError`] at the backend boundary.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use stowage::{FileSystemBackend, Storage};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = FileSystemBackend::new("/srv/uploads", "https://example.com/uploads")?;
//! let storage = Storage::new(backend);
//!
//! let name = storage.save("report.pdf", "contents", Some("invoices")).await?;
//! println!("Stored as {} at {}", name, storage.url(&name)?);
//!
//! let mut file = storage.open(&name).await?;
//! let data = file.read_to_end().await?;
//! assert_eq!(&data[..], b"contents");
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod content;
pub mod error;
pub mod file;
pub mod path;
pub mod resolver;
pub mod storage;
pub mod translate;

pub use backend::{
    Entry, EntryKind, FileSystemBackend, MemoryBackend, ObjectMetadata, ObjectReader,
    StorageBackend,
};
pub use config::{BackendKind, ConfigError, S3Config, StorageConfig};
pub use content::{ByteStream, Content};
pub use error::{ErrorKind, NativeStatus, Result, StorageError};
pub use file::StorageFile;
pub use path::safe_join;
pub use resolver::NameResolver;
pub use storage::Storage;
pub use translate::{NativeError, translate};

#[cfg(feature = "s3")]
pub use backend::S3Backend;

/// Get the library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
