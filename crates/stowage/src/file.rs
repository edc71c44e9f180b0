//! Read cursor over an opened stored object

use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;

use bytes::Bytes;

use crate::backend::{ObjectMetadata, ObjectReader, StorageBackend};
use crate::error::{Result, StorageError};

/// An opened stored object with a read position.
///
/// Works the same for every backend. The underlying native handle is
/// released when the `StorageFile` is dropped.
pub struct StorageFile {
    name: String,
    backend: Arc<dyn StorageBackend>,
    reader: Box<dyn ObjectReader>,
    pos: u64,
    size: Option<u64>,
}

impl StorageFile {
    pub(crate) fn new(
        name: String,
        backend: Arc<dyn StorageBackend>,
        reader: Box<dyn ObjectReader>,
    ) -> Self {
        Self {
            name,
            backend,
            reader,
            pos: 0,
            size: None,
        }
    }

    /// Full logical name the file was opened under, folders included
    /// (`invoices/report.pdf`, not just `report.pdf`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size as reported by the backend; fetched once per handle
    pub async fn size(&mut self) -> Result<u64> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let size = self.reader.size().await?;
        self.size = Some(size);
        Ok(size)
    }

    /// Read up to `size` bytes from the current position, or everything
    /// that is left with `None`. Returns an empty buffer at end of file.
    pub async fn read(&mut self, size: Option<usize>) -> Result<Bytes> {
        let remaining = self.size().await?.saturating_sub(self.pos);
        let wanted = match size {
            Some(size) => remaining.min(size as u64),
            None => remaining,
        };
        if wanted == 0 {
            return Ok(Bytes::new());
        }

        let len = usize::try_from(wanted).map_err(|_| {
            StorageError::invalid_argument(format!("{}: read of {} bytes is too large", self.name, wanted))
        })?;
        let data = self.reader.read_at(self.pos, len).await?;
        self.pos += data.len() as u64;
        Ok(data)
    }

    /// Read everything from the current position to the end
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        self.read(None).await
    }

    /// Move the read position. Positions past the end are allowed and read
    /// as empty; negative positions fail with `InvalidArgument`.
    pub async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.size().await?) + i128::from(delta),
        };

        self.pos = u64::try_from(target).map_err(|_| {
            StorageError::invalid_argument(format!("{}: invalid seek to {}", self.name, target))
        })?;
        Ok(self.pos)
    }

    /// Current read position
    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn url(&self) -> Result<String> {
        self.backend.public_url(&self.name)
    }

    pub async fn metadata(&self) -> Result<ObjectMetadata> {
        self.backend.stat(&self.name).await
    }

    /// Close the handle and delete the object
    pub async fn delete(self) -> Result<()> {
        let StorageFile {
            name,
            backend,
            reader,
            ..
        } = self;
        drop(reader);
        backend.remove(&name).await
    }
}

impl fmt::Debug for StorageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageFile")
            .field("name", &self.name)
            .field("backend", &self.backend.kind())
            .field("pos", &self.pos)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::content::Content;
    use crate::error::ErrorKind;

    async fn open(data: &str) -> StorageFile {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new("bucket"));
        backend
            .persist("f.txt", Content::text(data).into_stream())
            .await
            .unwrap();
        let reader = backend.open("f.txt").await.unwrap();
        StorageFile::new("f.txt".to_string(), backend, reader)
    }

    #[tokio::test]
    async fn test_read_advances_cursor() {
        let mut file = open("hello world").await;
        assert_eq!(file.read(Some(5)).await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(file.tell(), 5);
        assert_eq!(file.read(Some(100)).await.unwrap(), Bytes::from_static(b" world"));
        assert_eq!(file.tell(), 11);
        assert!(file.read(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_at_end_is_empty() {
        let mut file = open("0123456789").await;
        let size = file.size().await.unwrap();
        file.seek(SeekFrom::Start(size)).await.unwrap();
        assert!(file.read(None).await.unwrap().is_empty());
        assert!(file.read(Some(4)).await.unwrap().is_empty());

        file.seek(SeekFrom::Start(size + 10)).await.unwrap();
        assert!(file.read(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seek_whence() {
        let mut file = open("0123456789").await;

        assert_eq!(file.seek(SeekFrom::End(-3)).await.unwrap(), 7);
        assert_eq!(file.tell(), 7);
        assert_eq!(file.read(None).await.unwrap(), Bytes::from_static(b"789"));

        file.seek(SeekFrom::Start(2)).await.unwrap();
        assert_eq!(file.seek(SeekFrom::Current(3)).await.unwrap(), 5);
        assert_eq!(file.read(Some(2)).await.unwrap(), Bytes::from_static(b"56"));
    }

    #[tokio::test]
    async fn test_negative_seek_is_invalid() {
        let mut file = open("abc").await;
        let err = file.seek(SeekFrom::End(-4)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = file.seek(SeekFrom::Current(-1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(file.tell(), 0);
    }

    #[tokio::test]
    async fn test_delete_through_handle() {
        let file = open("bye").await;
        let backend = Arc::clone(&file.backend);
        file.delete().await.unwrap();
        assert!(!backend.exists("f.txt").await.unwrap());
    }
}
