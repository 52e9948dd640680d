//! Global constants used throughout the tplcache codebase.
//!
//! Timeouts, file names and the blob reference format live here so the
//! repositories, the blob store and the CLI agree on them.

use std::time::Duration;

/// Default timeout for per-key cache guard acquisition (120 seconds).
///
/// A compile holds its `(job, instance)` guard across rendering and upload, so the
/// timeout has to cover a slow render of a large job.
pub fn default_lock_timeout() -> Duration {
    Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS)
}

/// Default lock timeout in seconds, as stored in configuration.
pub const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 120;

/// URL scheme of blob references handed to job archive readers.
pub const BLOB_URL_SCHEME: &str = "blobstore";

/// Query parameter carrying the fingerprint in a blob reference.
pub const FINGERPRINT_QUERY_KEY: &str = "fingerprint";

/// Algorithm prefix of every fingerprint produced by the local blob store.
pub const FINGERPRINT_PREFIX: &str = "sha256:";

/// Name of the job manifest inside a job source tarball.
pub const JOB_MANIFEST_FILE: &str = "job.MF";

/// Directory holding template sources inside a job source tarball.
pub const JOB_TEMPLATES_DIR: &str = "templates";

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "tplcache.toml";

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "TPLCACHE_CONFIG";

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "TPLCACHE_STATE_DIR";
