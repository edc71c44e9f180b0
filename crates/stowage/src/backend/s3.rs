//! S3-compatible backend using the MinIO client
//!
//! Works with AWS S3, MinIO and any S3-compatible object storage. The root
//! is a bucket plus an optional key prefix; folders are implied by keys, and
//! creating the root folder creates the bucket.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use minio::s3::{
    client::Client,
    creds::StaticProvider,
    http::BaseUrl,
    segmented_bytes::SegmentedBytes,
    types::{S3Api, ToStream},
};
use time::OffsetDateTime;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use super::{
    Entry, EntryKind, ObjectMetadata, ObjectReader, StorageBackend, encode_key,
    immediate_children,
};
use crate::config::S3Config;
use crate::content::ByteStream;
use crate::error::{Result, StorageError};
use crate::path::safe_join;
use crate::translate::{NativeError, TranslateExt, translate};

/// S3 storage rooted at `bucket/prefix`
pub struct S3Backend {
    client: Arc<Client>,
    bucket: String,
    prefix: String,
    base_url: String,
}

impl S3Backend {
    /// Create a backend from an existing client
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Arc::new(client),
            bucket: bucket.into(),
            prefix: prefix.into(),
            base_url: base_url.into(),
        }
    }

    /// Build the client from endpoint and credentials
    pub fn from_config(config: &S3Config, base_url: Option<&str>) -> Result<Self> {
        let endpoint = BaseUrl::from_str(&config.endpoint).map_err(|e| {
            StorageError::invalid_argument(format!("Invalid S3 endpoint '{}': {}", config.endpoint, e))
        })?;

        let creds_provider = StaticProvider::new(&config.access_key, &config.secret_key, None);

        let client = Client::new(endpoint, Some(Box::new(creds_provider)), None, None)
            .map_err(|e| StorageError::generic(format!("Failed to create S3 client: {}", e)))?;

        let base_url = base_url.map(str::to_string).unwrap_or_else(|| {
            format!("{}/{}", config.endpoint.trim_end_matches('/'), config.bucket)
        });

        Ok(Self::new(client, &config.bucket, &config.prefix, base_url))
    }

    fn key(&self, name: &str) -> Result<String> {
        safe_join(&self.prefix, &[name])
    }

    fn is_root(&self, name: &str) -> bool {
        name.trim_matches('/').is_empty()
    }

    async fn keys_under(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut listing = self
            .client
            .list_objects(&self.bucket)
            .prefix(Some(prefix.to_string()))
            .recursive(true)
            .to_stream()
            .await;

        while let Some(result) = listing.next().await {
            let response = result.map_err(|e| translate(classify(e), prefix))?;
            keys.extend(response.contents.into_iter().map(|entry| entry.name));
        }
        Ok(keys)
    }
}

/// Reduce a MinIO error to an HTTP-like status by its S3 error code
fn classify(error: impl std::fmt::Display) -> NativeError {
    let message = error.to_string();
    let code = if message.contains("NoSuchKey")
        || message.contains("NoSuchBucket")
        || message.contains("404")
    {
        Some(404)
    } else if message.contains("BucketAlreadyOwnedByYou")
        || message.contains("BucketAlreadyExists")
        || message.contains("409")
    {
        Some(409)
    } else if message.contains("AccessDenied") || message.contains("403") {
        Some(403)
    } else {
        None
    };

    match code {
        Some(code) => NativeError::status(code, message),
        None => NativeError::other(message),
    }
}

fn folder_prefix(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{}/", key)
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kind(&self) -> &'static str {
        "s3"
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let key = self.key(name)?;
        match self.client.stat_object(&self.bucket, &key).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = translate(classify(e), name);
                if err.is_not_found() {
                    Ok(!self.keys_under(&folder_prefix(&key)).await?.is_empty())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn open(&self, name: &str) -> Result<Box<dyn ObjectReader>> {
        let key = self.key(name)?;
        self.client
            .stat_object(&self.bucket, &key)
            .send()
            .await
            .map_err(|e| translate(classify(e), name))?;

        Ok(Box::new(S3Reader {
            client: Arc::clone(&self.client),
            bucket: self.bucket.clone(),
            key,
            name: name.to_string(),
            size: None,
            data: None,
        }))
    }

    async fn persist(&self, name: &str, mut content: ByteStream) -> Result<u64> {
        let key = self.key(name)?;

        match self.make_dirs(crate::path::parent(name)).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {}
            Err(e) => return Err(e),
        }

        let mut data = Vec::new();
        content.read_to_end(&mut data).await.translate_err(name)?;
        let written = data.len() as u64;

        let bytes = SegmentedBytes::from(Bytes::from(data));
        self.client
            .put_object(&self.bucket, &key, bytes)
            .send()
            .await
            .map_err(|e| translate(classify(e), name))?;

        debug!("Uploaded {} bytes to s3://{}/{}", written, self.bucket, key);
        Ok(written)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        self.client
            .delete_object(&self.bucket, key.as_str())
            .send()
            .await
            .map_err(|e| translate(classify(e), name))?;
        Ok(())
    }

    /// Deletes every key below the folder. The bucket itself is kept.
    async fn remove_tree(&self, name: &str) -> Result<()> {
        let key = self.key(name)?;
        let keys = self.keys_under(&folder_prefix(&key)).await?;
        if keys.is_empty() {
            return Err(translate(NativeError::status(404, "NoSuchKey"), name));
        }
        for object in keys {
            self.client
                .delete_object(&self.bucket, object.as_str())
                .send()
                .await
                .map_err(|e| translate(classify(e), &object))?;
        }
        Ok(())
    }

    async fn make_dirs(&self, name: &str) -> Result<()> {
        self.key(name)?;
        if !self.is_root(name) {
            return Ok(());
        }

        let response = self
            .client
            .bucket_exists(&self.bucket)
            .send()
            .await
            .map_err(|e| translate(classify(e), &self.bucket))?;
        if response.exists {
            return Err(translate(
                NativeError::status(409, "BucketAlreadyOwnedByYou"),
                &self.bucket,
            ));
        }

        self.client
            .create_bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| translate(classify(e), &self.bucket))?;
        info!("Created bucket {}", self.bucket);
        Ok(())
    }

    async fn list_entries(&self, folder: &str) -> Result<BoxStream<'static, Result<Entry>>> {
        let key = self.key(folder)?;
        let keys = self.keys_under(&folder_prefix(&key)).await?;
        let children = immediate_children(
            &key,
            keys.iter().map(|k| (k.as_str(), EntryKind::File)),
        );
        Ok(stream::iter(children.into_iter().map(Ok)).boxed())
    }

    async fn stat(&self, name: &str) -> Result<ObjectMetadata> {
        let key = self.key(name)?;
        let response = self
            .client
            .stat_object(&self.bucket, &key)
            .send()
            .await
            .map_err(|e| translate(classify(e), name))?;

        Ok(ObjectMetadata {
            size: response.size,
            modified: response
                .last_modified
                .and_then(|t| OffsetDateTime::from_unix_timestamp(t.timestamp()).ok()),
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

/// Lazily fetched object; the body is downloaded on the first read
struct S3Reader {
    client: Arc<Client>,
    bucket: String,
    key: String,
    name: String,
    size: Option<u64>,
    data: Option<Bytes>,
}

impl S3Reader {
    async fn body(&mut self) -> Result<&Bytes> {
        if self.data.is_none() {
            let response = self
                .client
                .get_object(&self.bucket, &self.key)
                .send()
                .await
                .map_err(|e| translate(classify(e), &self.name))?;
            let content = response
                .content
                .to_segmented_bytes()
                .await
                .map_err(|e| translate(classify(e), &self.name))?;
            self.data = Some(content.to_bytes());
        }
        self.data
            .as_ref()
            .ok_or_else(|| StorageError::generic(format!("{}: empty response body", self.name)))
    }
}

#[async_trait]
impl ObjectReader for S3Reader {
    async fn size(&mut self) -> Result<u64> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let response = self
            .client
            .stat_object(&self.bucket, &self.key)
            .send()
            .await
            .map_err(|e| translate(classify(e), &self.name))?;
        self.size = Some(response.size);
        Ok(response.size)
    }

    async fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes> {
        let body = self.body().await?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(body.len());
        let end = start.saturating_add(len).min(body.len());
        Ok(body.slice(start..end))
    }
}
