use anyhow::{Context, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

use super::{BlobId, BlobStore, Fingerprint, compute_checksum};
use crate::core::TplError;
use crate::utils::fs::ensure_dir;

/// Blob store on a local directory.
///
/// Each blob is a file named by a random UUID. Uploads are copied to a temporary
/// name inside the store and renamed into place, so a blob id never points at a
/// partially written file.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, blob_id: &BlobId) -> Result<PathBuf> {
        let id = blob_id.as_str();
        if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
            return Err(TplError::InvalidBlobRef {
                url: id.to_string(),
                reason: "blob id must be a plain file name".to_string(),
            }
            .into());
        }
        Ok(self.dir.join(id))
    }

    fn create_blocking(dir: &Path, source: &Path) -> Result<(BlobId, Fingerprint)> {
        ensure_dir(dir)?;

        let staged = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Creating staging file in {}", dir.display()))?;
        std::fs::copy(source, staged.path())
            .with_context(|| format!("Copying {} into blob store", source.display()))?;

        // Fingerprint the bytes that are stored, not the source they came from
        let fingerprint = compute_checksum(staged.path())?;
        let blob_id = BlobId::new(uuid::Uuid::new_v4().to_string());
        staged
            .persist(dir.join(blob_id.as_str()))
            .with_context(|| format!("Storing blob {blob_id}"))?;

        Ok((blob_id, Fingerprint::new(fingerprint)))
    }
}

impl BlobStore for LocalBlobStore {
    fn create<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<(BlobId, Fingerprint)>> {
        async move {
            let dir = self.dir.clone();
            let source = path.to_path_buf();
            let (blob_id, fingerprint) =
                tokio::task::spawn_blocking(move || Self::create_blocking(&dir, &source))
                    .await
                    .context("Blob upload task panicked")??;

            tracing::info!("Stored blob {} ({}) from {}", blob_id, fingerprint, path.display());
            Ok((blob_id, fingerprint))
        }
        .boxed()
    }

    fn get<'a>(
        &'a self,
        blob_id: &'a BlobId,
        fingerprint: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        async move {
            let path = self.blob_path(blob_id)?;
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(TplError::BlobNotFound {
                    blob_id: blob_id.to_string(),
                }
                .into());
            }

            let check_path = path.clone();
            let actual = tokio::task::spawn_blocking(move || compute_checksum(&check_path))
                .await
                .context("Blob verification task panicked")??;

            if actual != fingerprint.as_str() {
                return Err(TplError::FingerprintMismatch {
                    blob_id: blob_id.to_string(),
                    expected: fingerprint.to_string(),
                    actual,
                }
                .into());
            }

            Ok(path)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::find_tpl_error;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_then_get() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("router.tgz");
        std::fs::write(&source, b"router source").unwrap();

        let store = LocalBlobStore::new(dir.path().join("blobs"));
        let (blob_id, fingerprint) = store.create(&source).await.unwrap();

        assert!(fingerprint.as_str().starts_with("sha256:"));
        let stored = store.get(&blob_id, &fingerprint).await.unwrap();
        assert_eq!(std::fs::read(stored).unwrap(), b"router source");
    }

    #[tokio::test]
    async fn test_same_content_gets_same_fingerprint_new_id() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a");
        std::fs::write(&source, b"x").unwrap();
        let store = LocalBlobStore::new(dir.path().join("blobs"));

        let (id1, fp1) = store.create(&source).await.unwrap();
        let (id2, fp2) = store.create(&source).await.unwrap();
        assert_ne!(id1, id2);
        assert_eq!(fp1, fp2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fingerprint_matches_stored_bytes_while_source_changes() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("router.tgz");
        std::fs::write(&source, vec![b'a'; 256 * 1024]).unwrap();
        let store = LocalBlobStore::new(dir.path().join("blobs"));

        let stop = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let writer = {
            let source = source.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut fill = b'a';
                while !stop.load(std::sync::atomic::Ordering::SeqCst) {
                    fill = if fill == b'a' { b'b' } else { b'a' };
                    let _ = std::fs::write(&source, vec![fill; 256 * 1024]);
                }
            })
        };

        for _ in 0..20 {
            let (blob_id, fingerprint) = store.create(&source).await.unwrap();
            store.get(&blob_id, &fingerprint).await.unwrap();
        }

        stop.store(true, std::sync::atomic::Ordering::SeqCst);
        writer.join().unwrap();
    }

    #[tokio::test]
    async fn test_get_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a");
        std::fs::write(&source, b"original").unwrap();
        let store = LocalBlobStore::new(dir.path().join("blobs"));
        let (blob_id, fingerprint) = store.create(&source).await.unwrap();

        std::fs::write(store.dir().join(blob_id.as_str()), b"tampered").unwrap();

        let err = store.get(&blob_id, &fingerprint).await.unwrap_err();
        assert!(matches!(find_tpl_error(&err), Some(TplError::FingerprintMismatch { .. })));
    }

    #[tokio::test]
    async fn test_get_unknown_blob() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let err = store
            .get(&BlobId::new("missing"), &Fingerprint::new("sha256:00"))
            .await
            .unwrap_err();
        assert!(matches!(find_tpl_error(&err), Some(TplError::BlobNotFound { .. })));
    }

    #[tokio::test]
    async fn test_get_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.get(&BlobId::new("../etc"), &Fingerprint::new("x")).await.is_err());
    }
}
