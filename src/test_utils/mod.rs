//! Test utilities for tplcache
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests under `tests/`.
//!
//! - [`fixtures`] - job tarballs, job descriptions and the router release
//! - [`fakes`] - blob store, reader factory and archive compiler fakes with call
//!   counters and failure injection
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tplcache::test_utils::{CountingBlobStore, FakeArchiveCompiler, FakeReaderFactory};
//!
//! let store = Arc::new(CountingBlobStore::new("/tmp/blobs"));
//! let readers = FakeReaderFactory::new(store.clone());
//! let renderer = FakeArchiveCompiler::new("/tmp/work");
//! ```

pub mod fakes;
pub mod fixtures;

pub use fakes::{
    CountingBlobStore, CountingRepository, FailingRepository, FakeArchiveCompiler,
    FakeReaderFactory,
};
pub use fixtures::{
    JobArchiveBuilder, job_description, release_job, router_release, write_job_description,
};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither set no subscriber is installed.
///
/// ```bash
/// RUST_LOG=tplcache=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
