use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::BlobError;
use crate::handle::BlobHandle;
use crate::BlobStore;

/// In-memory blob store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<BlobHandle, Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Drop a blob. Not part of [`BlobStore`]; tests use it to simulate data loss.
    pub fn remove(&self, handle: &BlobHandle) -> Option<Bytes> {
        self.blobs.remove(handle).map(|(_, bytes)| bytes)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn kind(&self) -> &str {
        "memory"
    }

    async fn put(&self, bytes: Bytes) -> Result<BlobHandle, BlobError> {
        let handle = BlobHandle::for_bytes(&bytes);
        self.blobs.entry(handle.clone()).or_insert(bytes);
        Ok(handle)
    }

    async fn get(&self, handle: &BlobHandle) -> Result<Option<Bytes>, BlobError> {
        Ok(self.blobs.get(handle).map(|entry| entry.value().clone()))
    }

    async fn exists(&self, handle: &BlobHandle) -> Result<bool, BlobError> {
        Ok(self.blobs.contains_key(handle))
    }
}
