//! The caller-facing storage facade

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::backend::{EntryKind, ObjectMetadata, StorageBackend};
use crate::content::Content;
use crate::error::{Result, StorageError};
use crate::file::StorageFile;
use crate::path::{basename, clean_name, normalize, safe_join, secure_filename};
use crate::resolver::NameResolver;

/// Uniform access to stored files on any backend.
///
/// Incoming names are cleaned (`\` to `/`, `.` and `..` resolved lexically)
/// before they reach the backend, and the backend checks containment against
/// its root on every call. Errors from the backend are passed on untouched.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    resolver: NameResolver,
}

impl Storage {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            resolver: NameResolver::default(),
        }
    }

    /// Use a different collision resolver, e.g. one with an attempt cap
    pub fn with_resolver(mut self, resolver: NameResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Open a stored file for reading
    pub async fn open(&self, name: &str) -> Result<StorageFile> {
        let name = clean_name(name);
        let reader = self.backend.open(&name).await?;
        Ok(StorageFile::new(name, Arc::clone(&self.backend), reader))
    }

    /// Store `content` and return the name it was stored under.
    ///
    /// Only the cleaned basename of `name` is used. With a `folder` the file
    /// goes into that folder (which must stay inside the root). If the name
    /// is taken a numbered variant is chosen, see [`NameResolver`].
    pub async fn save(
        &self,
        name: &str,
        content: impl Into<Content>,
        folder: Option<&str>,
    ) -> Result<String> {
        let filename = secure_filename(basename(name));
        if filename.is_empty() {
            return Err(StorageError::invalid_argument(format!(
                "'{}' does not contain a usable file name",
                name
            )));
        }

        let candidate = match folder {
            Some(folder) => safe_join(&normalize(folder), &[filename.as_str()])?,
            None => filename,
        };

        let name = self.get_available_name(&candidate).await?;
        let written = self
            .backend
            .persist(&name, content.into().into_stream())
            .await?;

        info!("Saved {} ({} bytes) to {} storage", name, written, self.backend.kind());
        Ok(name)
    }

    /// A name derived from `name` that is free right now
    pub async fn get_available_name(&self, name: &str) -> Result<String> {
        let name = clean_name(name);
        let available = self.resolver.resolve(self.backend.as_ref(), &name).await?;
        if available != name {
            debug!("Renamed {} to {} to avoid a collision", name, available);
        }
        Ok(available)
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        self.backend.exists(&clean_name(name)).await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        let name = clean_name(name);
        self.backend.remove(&name).await?;
        info!("Deleted {}", name);
        Ok(())
    }

    /// Delete a folder with everything in it
    pub async fn delete_folder(&self, name: &str) -> Result<()> {
        let name = clean_name(name);
        self.backend.remove_tree(&name).await?;
        info!("Deleted folder {}", name);
        Ok(())
    }

    /// Create a folder. Fails if it already exists.
    pub async fn create_folder(&self, name: &str) -> Result<()> {
        let name = clean_name(name);
        self.backend.make_dirs(&name).await?;
        info!("Created folder {}", name);
        Ok(())
    }

    /// Public URL of a stored file
    pub fn url(&self, name: &str) -> Result<String> {
        self.backend.public_url(&clean_name(name))
    }

    /// Local filesystem path of a stored file, `NotSupported` on remote backends
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        self.backend.local_path(&clean_name(name))
    }

    pub async fn metadata(&self, name: &str) -> Result<ObjectMetadata> {
        self.backend.stat(&clean_name(name)).await
    }

    pub async fn size(&self, name: &str) -> Result<u64> {
        Ok(self.metadata(name).await?.size)
    }

    pub async fn modified_time(&self, name: &str) -> Result<Option<OffsetDateTime>> {
        Ok(self.metadata(name).await?.modified)
    }

    /// Folders directly under the root
    pub async fn list_folders(&self) -> Result<BoxStream<'static, Result<String>>> {
        self.list_in("", EntryKind::Folder).await
    }

    /// Files directly under the root
    pub async fn list_files(&self) -> Result<BoxStream<'static, Result<String>>> {
        self.list_in("", EntryKind::File).await
    }

    pub async fn list_folders_in(&self, folder: &str) -> Result<BoxStream<'static, Result<String>>> {
        self.list_in(folder, EntryKind::Folder).await
    }

    pub async fn list_files_in(&self, folder: &str) -> Result<BoxStream<'static, Result<String>>> {
        self.list_in(folder, EntryKind::File).await
    }

    async fn list_in(
        &self,
        folder: &str,
        kind: EntryKind,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let entries = self.backend.list_entries(&clean_name(folder)).await?;
        let names = entries.filter_map(move |entry| {
            std::future::ready(match entry {
                Ok(entry) if entry.kind == kind => Some(Ok(entry.name)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        });
        Ok(names.boxed())
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("backend", &self.backend.kind())
            .field("resolver", &self.resolver)
            .finish()
    }
}
