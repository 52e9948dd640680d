//! Rendering of job templates into instance-specific archives.
//!
//! The compiler never renders anything itself: it hands the job descriptions it has
//! read and the target instance to an [`ArchiveCompiler`], uploads whatever archive
//! comes back, and then asks the same compiler to clean that archive up.
//!
//! [`TeraArchiveCompiler`] is the bundled implementation. Each job template is
//! rendered with [Tera](https://keats.github.io/tera/) against a context holding the
//! instance identity and the merged job properties (see [`context`]):
//!
//! ```text
//! # templates/router.conf.tera
//! listen {{ properties.router.port }}
//! instance {{ spec.job_name }}/{{ spec.index }}
//! ```
//!
//! Output is laid out as `<job>/<destination>` inside a gzip tarball.

mod archive;
pub mod context;
mod error;
mod renderer;

pub use archive::TeraArchiveCompiler;
pub use context::build_context;
pub use error::{ErrorLocation, TemplateError};
pub use renderer::{RenderingMetadata, TemplateRenderer};

use anyhow::Result;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

use crate::models::{Instance, JobDescription};

/// Turns job descriptions plus an instance into one local archive file.
pub trait ArchiveCompiler: Send + Sync {
    /// Render `jobs` for `instance`, returning the path of the produced archive.
    fn compile<'a>(
        &'a self,
        jobs: &'a [JobDescription],
        instance: &'a Instance,
    ) -> BoxFuture<'a, Result<PathBuf>>;

    /// Remove an archive previously returned by [`ArchiveCompiler::compile`].
    fn clean_up(&self, path: &Path) -> Result<()>;
}
