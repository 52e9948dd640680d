//! Scope guards that release readers and rendered archives on every exit path,
//! including early returns and a dropped (cancelled) compile future.

use std::path::{Path, PathBuf};

use crate::models::ReleaseJob;
use crate::reader::JobReader;
use crate::templating::ArchiveCompiler;

/// Readers opened for one compile, each paired with the release job it reads.
pub(super) struct OpenReaders {
    readers: Vec<(ReleaseJob, Option<Box<dyn JobReader>>)>,
}

impl OpenReaders {
    pub(super) fn new() -> Self {
        Self {
            readers: Vec::new(),
        }
    }

    pub(super) fn push(&mut self, job: ReleaseJob, reader: Box<dyn JobReader>) {
        self.readers.push((job, Some(reader)));
    }

    pub(super) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (&ReleaseJob, &mut Box<dyn JobReader>)> {
        self.readers.iter_mut().filter_map(|(job, reader)| Some((&*job, reader.as_mut()?)))
    }

    /// Close every reader still open. Each reader is closed at most once; close
    /// failures are logged, not propagated.
    pub(super) fn close_all(&mut self) {
        for (job, slot) in &mut self.readers {
            if let Some(mut reader) = slot.take()
                && let Err(e) = reader.close()
            {
                tracing::warn!(
                    "Failed to close reader for job '{}' ({}): {:#}",
                    job.name,
                    reader.url(),
                    e
                );
            }
        }
    }
}

impl Drop for OpenReaders {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// A rendered archive on local disk, handed back to its compiler for clean-up
/// exactly once when the guard goes out of scope.
pub(super) struct RenderedArchive<'a> {
    compiler: &'a dyn ArchiveCompiler,
    path: PathBuf,
}

impl<'a> RenderedArchive<'a> {
    pub(super) fn new(compiler: &'a dyn ArchiveCompiler, path: PathBuf) -> Self {
        Self { compiler, path }
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RenderedArchive<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.compiler.clean_up(&self.path) {
            tracing::warn!("Failed to clean up rendered archive {}: {:#}", self.path.display(), e);
        }
    }
}
