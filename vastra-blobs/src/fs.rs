use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;
use crate::handle::BlobHandle;
use crate::BlobStore;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem blob store. Each blob lives at `<root>/<first two hex chars>/<handle>`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written blob.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, handle: &BlobHandle) -> PathBuf {
        let digest = handle.as_str();
        let mut path = self.root.clone();
        path.push(&digest[..2]);
        path.push(digest);
        path
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn kind(&self) -> &str {
        "filesystem"
    }

    async fn put(&self, bytes: Bytes) -> Result<BlobHandle, BlobError> {
        let handle = BlobHandle::for_bytes(&bytes);
        let path = self.path_for(&handle);

        if tokio::fs::try_exists(&path).await? {
            tracing::debug!(handle = %handle, "blob already stored");
            return Ok(handle);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp-{}-{seq}", std::process::id()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(handle = %handle, size = bytes.len(), "stored blob");
        Ok(handle)
    }

    async fn get(&self, handle: &BlobHandle) -> Result<Option<Bytes>, BlobError> {
        match tokio::fs::read(self.path_for(handle)).await {
            Ok(content) => Ok(Some(Bytes::from(content))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, handle: &BlobHandle) -> Result<bool, BlobError> {
        Ok(tokio::fs::try_exists(self.path_for(handle)).await?)
    }
}
