//! Lookup tables backing the template compilation cache.
//!
//! Every table has the same shape: `find` distinguishes legitimate absence
//! (`Ok(None)`) from an access failure (`Err`), and `save` overwrites. The shape is
//! captured once by [`Repository`]; the domain repositories in this module are thin
//! typed wrappers that pick the key for each table:
//!
//! | Repository | Key | Value |
//! |---|---|---|
//! | [`JobsRepository`] | release job identity | [`JobRecord`] |
//! | [`TemplateToJobRepository`] | template name | [`ReleaseJob`] |
//! | [`RuntimePackagesRepository`] | release job identity + slot | package list |
//! | [`TemplatesRepository`] | deployment job + instance | [`TemplateRecord`] |
//!
//! Backends are [`MemoryRepository`] for tests and short-lived processes and
//! [`JsonFileRepository`] for state that must survive between CLI invocations.
//!
//! [`ReleaseJob`]: crate::models::ReleaseJob

mod jobs;
mod json_file;
mod memory;
mod packages;
mod templates;

pub use jobs::{JobsRepository, TemplateToJobRepository};
pub use json_file::JsonFileRepository;
pub use memory::MemoryRepository;
pub use packages::{PackageSlot, PackagesKey, RuntimePackagesRepository};
pub use templates::{TemplateKey, TemplatesRepository};

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::blobstore::{BlobId, Fingerprint};

/// Generic keyed table with find/save semantics.
///
/// Futures are boxed so repositories can be shared as `Arc<dyn Repository<K, V>>`
/// and swapped for fakes in tests.
pub trait Repository<K, V>: Send + Sync {
    /// Look up a value. `Ok(None)` means the key was never saved.
    fn find<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Result<Option<V>>>;

    /// Store a value, replacing any previous one.
    fn save<'a>(&'a self, key: K, value: V) -> BoxFuture<'a, Result<()>>;
}

/// Location of a job's uploaded source archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub blob_id: BlobId,
    pub fingerprint: Fingerprint,
}

/// Location of a rendered template archive for one `(job, instance)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub blob_id: BlobId,
    pub fingerprint: Fingerprint,
}
