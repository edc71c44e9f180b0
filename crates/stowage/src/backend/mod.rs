//! Storage backend abstraction
//!
//! A backend is the concrete medium behind [`crate::Storage`]. Each one
//! implements every method of [`StorageBackend`] explicitly and translates
//! all native failures through [`crate::translate`] before returning them.
//!
//! Names passed to backends are already cleaned logical names. Backends
//! still resolve every name through [`crate::path::safe_join`] against their
//! own root, so no backend call can reach outside of it.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::content::ByteStream;
use crate::error::Result;

pub mod filesystem;
pub mod memory;

#[cfg(feature = "s3")]
pub mod s3;

pub use filesystem::FileSystemBackend;
pub use memory::MemoryBackend;

#[cfg(feature = "s3")]
pub use s3::S3Backend;

/// Whether a listed entry is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One immediate child of a listed folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
}

/// Metadata derived from the backend at the time of the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub size: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
}

/// An opened stored object that can be read at arbitrary offsets.
///
/// The native resource is released when the reader is dropped.
#[async_trait]
pub trait ObjectReader: Send {
    /// Total length of the object in bytes
    async fn size(&mut self) -> Result<u64>;

    /// Read up to `len` bytes starting at `offset`
    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes>;
}

/// Capabilities every storage medium provides
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name used in logs and errors
    fn kind(&self) -> &'static str;

    /// Check whether an object or folder exists under `name`
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Open an object for reading
    async fn open(&self, name: &str) -> Result<Box<dyn ObjectReader>>;

    /// Write `content` to `name`, replacing anything stored there.
    /// Returns the number of bytes written.
    async fn persist(&self, name: &str, content: ByteStream) -> Result<u64>;

    /// Remove a single object
    async fn remove(&self, name: &str) -> Result<()>;

    /// Remove a folder and everything below it
    async fn remove_tree(&self, name: &str) -> Result<()>;

    /// Create a folder and its parents. Fails with `AlreadyExists` or
    /// `Conflict` when the folder itself is already there.
    async fn make_dirs(&self, name: &str) -> Result<()>;

    /// Immediate children of `folder`, `""` being the root
    async fn list_entries(&self, folder: &str) -> Result<BoxStream<'static, Result<Entry>>>;

    /// Size and modification time of an object
    async fn stat(&self, name: &str) -> Result<ObjectMetadata>;

    /// Public URL under which the object can be fetched
    fn public_url(&self, name: &str) -> Result<String>;

    /// Local filesystem path of the object, `NotSupported` where there is none
    fn local_path(&self, name: &str) -> Result<PathBuf>;
}

/// Percent-encode every segment of a `/`-separated key
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Immediate children of `folder` among a flat set of object keys.
///
/// Object stores only know full keys, so folders are derived from the first
/// path component after the folder prefix.
pub(crate) fn immediate_children<'a, I>(folder: &str, keys: I) -> Vec<Entry>
where
    I: IntoIterator<Item = (&'a str, EntryKind)>,
{
    let prefix = if folder.is_empty() {
        String::new()
    } else {
        format!("{}/", folder)
    };

    let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();
    for (key, kind) in keys {
        let Some(rest) = key.strip_prefix(prefix.as_str()) else {
            continue;
        };
        match rest.split_once('/') {
            Some((child, _)) if !child.is_empty() => {
                children.insert(child.to_string(), EntryKind::Folder);
            }
            Some(_) => {}
            None if !rest.is_empty() => {
                children.entry(rest.to_string()).or_insert(kind);
            }
            None => {}
        }
    }

    children
        .into_iter()
        .map(|(name, kind)| Entry { name, kind })
        .collect()
}
