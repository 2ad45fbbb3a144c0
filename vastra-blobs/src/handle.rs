use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::BlobError;

/// Content address of a stored blob: the lowercase hex SHA-256 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(String);

impl BlobHandle {
    /// Compute the handle for `bytes`.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse a handle received from outside, rejecting anything that is not a
    /// 64 character hex digest. Filesystem stores rely on this to keep handles
    /// from escaping their root directory.
    pub fn parse(raw: &str) -> Result<Self, BlobError> {
        let valid = raw.len() == 64 && raw.bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(BlobError::InvalidHandle(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_handle() {
        let a = BlobHandle::for_bytes(b"garment");
        let b = BlobHandle::for_bytes(b"garment");
        let c = BlobHandle::for_bytes(b"subject");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn parse_rejects_paths() {
        assert!(BlobHandle::parse("../../etc/passwd").is_err());
        assert!(BlobHandle::parse("abc").is_err());

        let digest = BlobHandle::for_bytes(b"x");
        let upper = digest.as_str().to_ascii_uppercase();
        assert_eq!(BlobHandle::parse(&upper).unwrap(), digest);
    }
}
