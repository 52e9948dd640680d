//! Readers that turn a stored job source archive into a [`JobDescription`].
//!
//! A [`ReaderFactory`] hands out lazy readers bound to a blob reference URL; no I/O
//! happens until [`JobReader::read`]. Reading is one-shot. Whatever the read
//! acquired (an unpacked archive on disk) stays owned by the reader until
//! [`JobReader::close`], which must be safe to call more than once.

mod tarball;

pub use tarball::{TarReader, TarReaderFactory};

use anyhow::Result;
use futures::future::BoxFuture;

use crate::models::JobDescription;

/// One-shot reader over a job source archive.
pub trait JobReader: Send {
    /// Blob reference URL this reader is bound to.
    fn url(&self) -> &str;

    /// Fetch and parse the archive.
    fn read(&mut self) -> BoxFuture<'_, Result<JobDescription>>;

    /// Release everything `read` acquired. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// Creates readers for blob reference URLs of the form
/// `blobstore:///<blob-id>?fingerprint=<fingerprint>`.
pub trait ReaderFactory: Send + Sync {
    fn new_reader(&self, url: &str) -> Box<dyn JobReader>;
}
