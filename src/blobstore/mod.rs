//! Content-addressed blob storage.
//!
//! The compiler only needs two operations from a blob store: upload a local file
//! and get back an opaque id plus a fingerprint, and later fetch a blob by id while
//! verifying the fingerprint. [`BlobStore`] captures that contract;
//! [`LocalBlobStore`] implements it on a local directory.
//!
//! Readers are handed blobs as [`BlobRef`] URLs of the form
//! `blobstore:///<blob-id>?fingerprint=<fingerprint>`.

mod checksum;
mod local;

pub use checksum::compute_checksum;
pub use local::LocalBlobStore;

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

use crate::constants::{BLOB_URL_SCHEME, FINGERPRINT_QUERY_KEY};
use crate::core::TplError;

/// Opaque identifier assigned by the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content digest, `sha256:<hex>` for blobs created by [`LocalBlobStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload and fetch content-addressed blobs.
pub trait BlobStore: Send + Sync {
    /// Upload the file at `path`, returning its new id and fingerprint.
    fn create<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(BlobId, Fingerprint)>>;

    /// Return a local path holding the blob's content after checking it against
    /// `fingerprint`.
    fn get<'a>(
        &'a self,
        blob_id: &'a BlobId,
        fingerprint: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<PathBuf>>;
}

/// Reference to a stored blob, carrying the fingerprint used to verify it on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub blob_id: BlobId,
    pub fingerprint: Fingerprint,
}

impl BlobRef {
    pub fn new(blob_id: BlobId, fingerprint: Fingerprint) -> Self {
        Self {
            blob_id,
            fingerprint,
        }
    }

    /// `blobstore:///<blob-id>?fingerprint=<fingerprint>`
    pub fn to_url(&self) -> String {
        format!(
            "{BLOB_URL_SCHEME}:///{}?{FINGERPRINT_QUERY_KEY}={}",
            self.blob_id, self.fingerprint
        )
    }

    pub fn parse(input: &str) -> Result<Self, TplError> {
        let invalid = |reason: &str| TplError::InvalidBlobRef {
            url: input.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(input).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != BLOB_URL_SCHEME {
            return Err(invalid("unexpected scheme"));
        }

        let blob_id = url.path().trim_start_matches('/');
        if blob_id.is_empty() || blob_id.contains('/') {
            return Err(invalid("expected exactly one path segment"));
        }

        let fingerprint = url
            .query_pairs()
            .find(|(key, _)| key == FINGERPRINT_QUERY_KEY)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| invalid("missing fingerprint"))?;

        Ok(Self::new(BlobId::new(blob_id), Fingerprint::new(fingerprint)))
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_ref_url_format() {
        let blob_ref = BlobRef::new(BlobId::new("abc-123"), Fingerprint::new("sha256:ff00"));
        assert_eq!(blob_ref.to_url(), "blobstore:///abc-123?fingerprint=sha256:ff00");
        assert_eq!(BlobRef::parse(&blob_ref.to_url()).unwrap(), blob_ref);
    }

    #[test]
    fn test_blob_ref_rejects_missing_fingerprint() {
        let err = BlobRef::parse("blobstore:///abc").unwrap_err();
        assert!(matches!(err, TplError::InvalidBlobRef { .. }));
    }

    #[test]
    fn test_blob_ref_rejects_other_scheme() {
        assert!(BlobRef::parse("https://example.com/abc?fingerprint=x").is_err());
    }

    #[test]
    fn test_blob_ref_rejects_nested_path() {
        assert!(BlobRef::parse("blobstore:///a/b?fingerprint=x").is_err());
    }
}
