use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tar::Archive;
use tempfile::TempDir;

use super::{JobReader, ReaderFactory};
use crate::blobstore::{BlobRef, BlobStore};
use crate::constants::{JOB_MANIFEST_FILE, JOB_TEMPLATES_DIR};
use crate::core::TplError;
use crate::models::{JobDescription, JobManifest};

/// Builds [`TarReader`]s that fetch job tarballs from a blob store.
#[derive(Clone)]
pub struct TarReaderFactory {
    blobstore: Arc<dyn BlobStore>,
    work_dir: Option<PathBuf>,
}

impl TarReaderFactory {
    pub fn new(blobstore: Arc<dyn BlobStore>) -> Self {
        Self {
            blobstore,
            work_dir: None,
        }
    }

    /// Unpack archives under `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }
}

impl ReaderFactory for TarReaderFactory {
    fn new_reader(&self, url: &str) -> Box<dyn JobReader> {
        Box::new(TarReader {
            url: url.to_string(),
            blobstore: Arc::clone(&self.blobstore),
            work_dir: self.work_dir.clone(),
            unpacked: None,
            consumed: false,
        })
    }
}

/// Reader over a gzip-compressed job tarball containing `job.MF` and `templates/`.
pub struct TarReader {
    url: String,
    blobstore: Arc<dyn BlobStore>,
    work_dir: Option<PathBuf>,
    unpacked: Option<TempDir>,
    consumed: bool,
}

impl TarReader {
    fn unpack(archive: &Path, work_dir: Option<&Path>) -> Result<(TempDir, JobDescription)> {
        let dest = match work_dir {
            Some(dir) => {
                crate::utils::ensure_dir(dir)?;
                tempfile::Builder::new().prefix("job-").tempdir_in(dir)
            }
            None => tempfile::Builder::new().prefix("job-").tempdir(),
        }
        .context("Creating job extraction directory")?;

        let file = File::open(archive)
            .with_context(|| format!("Opening job archive {}", archive.display()))?;
        Archive::new(GzDecoder::new(file))
            .unpack(dest.path())
            .with_context(|| format!("Extracting job archive {}", archive.display()))?;

        let description = Self::parse(archive, dest.path())?;
        Ok((dest, description))
    }

    fn parse(archive: &Path, root: &Path) -> Result<JobDescription> {
        let invalid = |reason: String| TplError::JobManifestInvalid {
            archive: archive.display().to_string(),
            reason,
        };

        let manifest_path = root.join(JOB_MANIFEST_FILE);
        let content = std::fs::read_to_string(&manifest_path)
            .map_err(|e| invalid(format!("cannot read {JOB_MANIFEST_FILE}: {e}")))?;
        let manifest: JobManifest =
            serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        let templates_dir = root.join(JOB_TEMPLATES_DIR);
        JobDescription::from_manifest(manifest, |source| {
            let relative = Path::new(source);
            if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
                return Err(invalid(format!("template path '{source}' escapes templates/")).into());
            }
            let path = templates_dir.join(relative);
            std::fs::read_to_string(&path)
                .with_context(|| format!("Reading template {} from job archive", source))
        })
    }
}

impl JobReader for TarReader {
    fn url(&self) -> &str {
        &self.url
    }

    fn read(&mut self) -> BoxFuture<'_, Result<JobDescription>> {
        async move {
            if self.consumed {
                return Err(TplError::ReaderAlreadyConsumed {
                    url: self.url.clone(),
                }
                .into());
            }
            self.consumed = true;

            let blob_ref = BlobRef::parse(&self.url)?;
            let archive = self
                .blobstore
                .get(&blob_ref.blob_id, &blob_ref.fingerprint)
                .await
                .with_context(|| format!("Fetching job archive {}", self.url))?;

            let work_dir = self.work_dir.clone();
            let (unpacked, description) =
                tokio::task::spawn_blocking(move || Self::unpack(&archive, work_dir.as_deref()))
                    .await
                    .context("Job archive extraction task panicked")??;

            tracing::debug!(
                "Read job '{}' ({} templates, {} packages) from {}",
                description.name,
                description.templates.len(),
                description.packages.len(),
                self.url
            );
            self.unpacked = Some(unpacked);
            Ok(description)
        }
        .boxed()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(dir) = self.unpacked.take() {
            let path = dir.path().to_path_buf();
            dir.close()
                .with_context(|| format!("Removing extracted job archive {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::LocalBlobStore;
    use crate::core::find_tpl_error;
    use crate::test_utils::JobArchiveBuilder;

    async fn stored_router(dir: &Path) -> (Arc<dyn BlobStore>, String) {
        let tarball = JobArchiveBuilder::new("router")
            .template("router.conf.tera", "config/router.conf", "port={{ properties.port }}")
            .package("router-pkg")
            .property("port", Some(serde_json::json!(8080)))
            .write_to(&dir.join("router.tgz"))
            .unwrap();

        let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.join("blobs")));
        let (blob_id, fingerprint) = store.create(&tarball).await.unwrap();
        (store, BlobRef::new(blob_id, fingerprint).to_url())
    }

    #[tokio::test]
    async fn test_read_parses_manifest_and_templates() {
        let dir = TempDir::new().unwrap();
        let (store, url) = stored_router(dir.path()).await;
        let factory = TarReaderFactory::new(store).with_work_dir(dir.path().join("work"));

        let mut reader = factory.new_reader(&url);
        let job = reader.read().await.unwrap();

        assert_eq!(job.name, "router");
        assert_eq!(job.package_names().collect::<Vec<_>>(), vec!["router-pkg"]);
        assert_eq!(job.templates[0].content, "port={{ properties.port }}");

        reader.close().unwrap();
        reader.close().unwrap();
        let leftover = std::fs::read_dir(dir.path().join("work")).unwrap().count();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_read_is_one_shot() {
        let dir = TempDir::new().unwrap();
        let (store, url) = stored_router(dir.path()).await;
        let mut reader = TarReaderFactory::new(store).new_reader(&url);

        reader.read().await.unwrap();
        let err = reader.read().await.unwrap_err();
        assert!(matches!(find_tpl_error(&err), Some(TplError::ReaderAlreadyConsumed { .. })));
        reader.close().unwrap();
    }

    #[tokio::test]
    async fn test_new_reader_is_lazy() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()));
        let mut reader = TarReaderFactory::new(store).new_reader("not a url");

        // Construction never fails; the bad URL surfaces on read.
        let err = reader.read().await.unwrap_err();
        assert!(matches!(find_tpl_error(&err), Some(TplError::InvalidBlobRef { .. })));
        reader.close().unwrap();
    }

    #[tokio::test]
    async fn test_missing_manifest_is_reported() {
        let dir = TempDir::new().unwrap();
        let tarball = dir.path().join("empty.tgz");
        JobArchiveBuilder::without_manifest().write_to(&tarball).unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path().join("blobs")));
        let (blob_id, fingerprint) = store.create(&tarball).await.unwrap();

        let mut reader =
            TarReaderFactory::new(store).new_reader(&BlobRef::new(blob_id, fingerprint).to_url());
        let err = reader.read().await.unwrap_err();
        assert!(matches!(find_tpl_error(&err), Some(TplError::JobManifestInvalid { .. })));
    }
}
