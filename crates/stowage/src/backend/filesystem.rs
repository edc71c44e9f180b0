//! Local filesystem backend
//!
//! Objects are regular files under the root directory, laid out exactly like
//! their logical names:
//!
//! ```text
//! root/
//! ├── avatar.png
//! └── invoices/
//!     ├── report.pdf
//!     └── report_1.pdf
//! ```
//!
//! There are no sidecar files; size and modification time come from the
//! filesystem at the time of the call.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use super::{Entry, EntryKind, ObjectMetadata, ObjectReader, StorageBackend, encode_key};
use crate::content::ByteStream;
use crate::error::Result;
use crate::path::{self, join_contained};
use crate::translate::TranslateExt;

/// Buffer size of the copy loop in [`FileSystemBackend::persist`]
pub const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// Filesystem storage rooted at one directory
#[derive(Debug, Clone)]
pub struct FileSystemBackend {
    root: PathBuf,
    root_location: String,
    base_url: String,
}

impl FileSystemBackend {
    /// Create a backend rooted at `root`.
    ///
    /// Relative roots are made absolute against the current directory and
    /// `.`/`..` components are resolved lexically. The directory does not
    /// have to exist yet; it is created by the first save. `base_url`
    /// prefixes the URLs returned by [`StorageBackend::public_url`].
    pub fn new(root: impl AsRef<Path>, base_url: impl Into<String>) -> Result<Self> {
        let root = root.as_ref();
        let absolute = std::path::absolute(root).translate_err(&root.display().to_string())?;
        // join_contained compares against the normalized form
        let root_location = path::normalize(&absolute.to_string_lossy());

        Ok(Self {
            root: PathBuf::from(&root_location),
            root_location,
            base_url: base_url.into(),
        })
    }

    /// The absolute root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        join_contained(&self.root_location, &[name]).map(PathBuf::from)
    }
}

#[async_trait]
impl StorageBackend for FileSystemBackend {
    fn kind(&self) -> &'static str {
        "filesystem"
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.resolve(name)?;
        fs::try_exists(&path).await.translate_err(name)
    }

    async fn open(&self, name: &str) -> Result<Box<dyn ObjectReader>> {
        let path = self.resolve(name)?;
        let file = fs::File::open(&path).await.translate_err(name)?;
        Ok(Box::new(FileReader {
            file,
            name: name.to_string(),
        }))
    }

    /// Copy `content` into the file through a fixed-size buffer.
    ///
    /// Parent directories are created first; an already existing directory
    /// is fine. A failure halfway through leaves the partially written file
    /// behind, nothing is rolled back.
    async fn persist(&self, name: &str, mut content: ByteStream) -> Result<u64> {
        let path = self.resolve(name)?;

        match self.make_dirs(path::parent(name)).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e),
        }

        let mut destination = fs::File::create(&path).await.translate_err(name)?;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut written = 0u64;
        loop {
            let read = content.read(&mut buffer).await.translate_err(name)?;
            if read == 0 {
                break;
            }
            destination
                .write_all(&buffer[..read])
                .await
                .translate_err(name)?;
            written += read as u64;
        }
        destination.flush().await.translate_err(name)?;

        debug!("Wrote {} bytes to {}", written, path.display());
        Ok(written)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).await.translate_err(name)
    }

    async fn remove_tree(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        fs::remove_dir_all(&path).await.translate_err(name)
    }

    async fn make_dirs(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.translate_err(name)?;
        }
        fs::create_dir(&path).await.translate_err(name)
    }

    async fn list_entries(&self, folder: &str) -> Result<BoxStream<'static, Result<Entry>>> {
        let path = self.resolve(folder)?;
        let entries = fs::read_dir(&path).await.translate_err(folder)?;

        let listing = stream::try_unfold(
            (entries, folder.to_string()),
            |(mut entries, context)| async move {
                let next = next_entry(&mut entries, &context).await;
                next.map(|next| next.map(|entry| (entry, (entries, context))))
            },
        );
        Ok(listing.boxed())
    }

    async fn stat(&self, name: &str) -> Result<ObjectMetadata> {
        let path = self.resolve(name)?;
        let metadata = fs::metadata(&path).await.translate_err(name)?;
        Ok(ObjectMetadata {
            size: metadata.len(),
            modified: metadata.modified().ok().map(OffsetDateTime::from),
        })
    }

    fn public_url(&self, name: &str) -> Result<String> {
        self.resolve(name)?;
        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            encode_key(name)
        ))
    }

    fn local_path(&self, name: &str) -> Result<PathBuf> {
        self.resolve(name)
    }
}

async fn next_entry(entries: &mut fs::ReadDir, context: &str) -> Result<Option<Entry>> {
    let Some(entry) = entries.next_entry().await.translate_err(context)? else {
        return Ok(None);
    };
    let file_type = entry.file_type().await.translate_err(context)?;
    let kind = if file_type.is_dir() {
        EntryKind::Folder
    } else {
        EntryKind::File
    };
    Ok(Some(Entry {
        name: entry.file_name().to_string_lossy().into_owned(),
        kind,
    }))
}

/// An open file handle
struct FileReader {
    file: fs::File,
    name: String,
}

#[async_trait]
impl ObjectReader for FileReader {
    async fn size(&mut self) -> Result<u64> {
        let metadata = self.file.metadata().await.translate_err(&self.name)?;
        Ok(metadata.len())
    }

    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes> {
        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .translate_err(&self.name)?;

        let mut buf = Vec::with_capacity(len);
        (&mut self.file)
            .take(len as u64)
            .read_to_end(&mut buf)
            .await
            .translate_err(&self.name)?;
        Ok(Bytes::from(buf))
    }
}
