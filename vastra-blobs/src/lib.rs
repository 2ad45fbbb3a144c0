//! Blob storage for the try-on service.
//!
//! Uploaded subject/overlay images and generated artifacts are kept behind the
//! [`BlobStore`] trait. Handles are content addresses (SHA-256 of the bytes), so
//! storing the same image twice yields the same handle and only one copy.
//!
//! - [`MemoryBlobStore`] - process-local store backed by a sharded map
//! - [`FsBlobStore`] - one file per blob under a root directory
//! - [`detect_image`] / [`content_type`] - magic-byte sniffing for uploads and results

mod content;
mod error;
mod fs;
mod handle;
mod memory;

use async_trait::async_trait;
use bytes::Bytes;

pub use content::{content_type, detect_image, SUPPORTED_IMAGE_FORMATS};
pub use error::BlobError;
pub use fs::FsBlobStore;
pub use handle::BlobHandle;
pub use memory::MemoryBlobStore;

// Re-exported so callers can name detected formats without depending on `image`.
pub use image::ImageFormat;

/// Opaque, thread-safe storage for image bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name used in logs and health output.
    fn kind(&self) -> &str;

    /// Store `bytes`, returning the handle that addresses them.
    async fn put(&self, bytes: Bytes) -> Result<BlobHandle, BlobError>;

    /// Fetch the bytes behind `handle`, or `None` if the blob is absent.
    async fn get(&self, handle: &BlobHandle) -> Result<Option<Bytes>, BlobError>;

    /// Whether a blob exists for `handle`.
    async fn exists(&self, handle: &BlobHandle) -> Result<bool, BlobError>;
}
