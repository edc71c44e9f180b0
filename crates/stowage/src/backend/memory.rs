//! In-memory backend
//!
//! Behaves like a small object store: objects live under flat keys, folders
//! are either explicit markers or implied by the keys below them, and
//! failures are reported as HTTP-like statuses before translation. Useful for
//! tests and for running without a disk.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use time::OffsetDateTime;
use tokio::io::AsyncReadExt;

use super::{
    Entry, EntryKind, ObjectMetadata, ObjectReader, StorageBackend, encode_key,
    immediate_children,
};
use crate::content::ByteStream;
use crate::error::{Result, StorageError};
use crate::path::{self, safe_join};
use crate::translate::{NativeError, TranslateExt, translate};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    modified: OffsetDateTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<String, StoredObject>,
    folders: BTreeSet<String>,
}

impl MemoryState {
    fn folder_exists(&self, root: &str, key: &str) -> bool {
        if key == root.trim_matches('/') || self.folders.contains(key) {
            return true;
        }
        let prefix = format!("{}/", key);
        self.objects.keys().any(|k| k.starts_with(&prefix))
            || self.folders.iter().any(|f| f.starts_with(&prefix))
    }

    /// The key itself or one of its ancestors is stored as an object
    fn object_on_path(&self, key: &str) -> bool {
        let mut current = key;
        loop {
            if self.objects.contains_key(current) {
                return true;
            }
            match current.rsplit_once('/') {
                Some((parent, _)) => current = parent,
                None => return false,
            }
        }
    }
}

/// In-memory storage rooted at a key prefix
#[derive(Debug)]
pub struct MemoryBackend {
    root: String,
    base_url: String,
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: "memory://".to_string(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// All stored object keys (useful for testing)
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.objects.keys().cloned().collect())
    }

    /// Number of stored objects
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.objects.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn key(&self, name: &str) -> Result<String> {
        safe_join(&self.root, &[name])
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::generic("Lock poisoned"))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("")
    }
}

fn not_found(name: &str) -> StorageError {
    translate(NativeError::status(404, "NoSuchKey"), name)
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let key = self.key(name)?;
        let state = self.lock()?;
        Ok(state.objects.contains_key(&key) || state.folder_exists(&self.root, &key))
    }

    async fn open(&self, name: &str) -> Result<Box<dyn ObjectReader>> {
        let key = self.key(name)?;
        let state = self.lock()?;
        let object = state.objects.get(&key).ok_or_else(|| not_found(name))?;
        Ok(Box::new(MemoryReader {
            data: object.data.clone(),
        }))
    }

    async fn persist(&self, name: &str, mut content: ByteStream) -> Result<u64> {
        let key = self.key(name)?;

        match self.make_dirs(path::parent(name)).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e),
        }

        let mut data = Vec::new();
        content.read_to_end(&mut data).await.translate_err(name)?;
        let written = data.len() as u64;

        let mut state = self.lock()?;
        if state.folders.contains(&key) {
            return Err(translate(
                NativeError::status(409, "a folder exists under this key"),
                name,
            ));
        }
        state.objects.insert(
            key,
            StoredObject {
                data: Bytes::from(data),
                modified: OffsetDateTime::now_utc(),
            },
        );
        Ok(written)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        let mut state = self.lock()?;
        state
            .objects
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    async fn remove_tree(&self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        let mut state = self.lock()?;
        if !state.folder_exists(&self.root, &key) {
            return Err(not_found(name));
        }

        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        };
        state.objects.retain(|k, _| !k.starts_with(&prefix));
        state.folders.retain(|f| f != &key && !f.starts_with(&prefix));
        Ok(())
    }

    async fn make_dirs(&self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        let mut state = self.lock()?;
        if state.object_on_path(&key) {
            return Err(translate(
                NativeError::status(400, "an object exists where a folder is expected"),
                name,
            ));
        }
        if state.folder_exists(&self.root, &key) {
            return Err(translate(
                NativeError::status(409, "folder already exists"),
                name,
            ));
        }
        state.folders.insert(key);
        Ok(())
    }

    async fn list_entries(&self, folder: &str) -> Result<BoxStream<'static, Result<Entry>>> {
        let key = self.key(folder)?;
        let state = self.lock()?;
        if !state.folder_exists(&self.root, &key) {
            return Err(not_found(folder));
        }

        let keys = state
            .objects
            .keys()
            .map(|k| (k.as_str(), EntryKind::File))
            .chain(state.folders.iter().map(|f| (f.as_str(), EntryKind::Folder)));
        let children = immediate_children(&key, keys);
        Ok(stream::iter(children.into_iter().map(Ok)).boxed())
    }

    async fn stat(&self, name: &str) -> Result<ObjectMetadata> {
        let key = self.key(name)?;
        let state = self.lock()?;
        let object = state.objects.get(&key).ok_or_else(|| not_found(name))?;
        Ok(ObjectMetadata {
            size: object.data.len() as u64,
            modified: Some(object.modified),
        })
    }

    fn public_url(&self, name: &str) -> Result<String> {
        let key = self.key(name)?;
        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            encode_key(&key)
        ))
    }

    fn local_path(&self, _name: &str) -> Result<PathBuf> {
        Err(StorageError::not_supported(self.kind(), "local paths"))
    }
}

/// Snapshot of an object taken at open time
struct MemoryReader {
    data: Bytes,
}

#[async_trait]
impl ObjectReader for MemoryReader {
    async fn size(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        Ok(self.data.slice(start..end))
    }
}
