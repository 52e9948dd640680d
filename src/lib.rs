//! tplcache - content-addressable template compilation cache
//!
//! Given a release (jobs with source tarballs, plus packages) and deployment
//! instances that need job templates, tplcache guarantees that:
//!
//! - each release job's source archive is stored exactly once in a blob store
//! - the packages a job needs at runtime are resolved once and memoized
//! - a rendered, instance-specific archive is produced, uploaded and recorded so it
//!   can be looked up later without recomputation
//!
//! # Workflow
//!
//! ```text
//! precompile(release)            once per release
//!   job sources  -> blob store   (skipped when already recorded)
//!   templates    -> release job
//!   release job  -> all release packages
//!
//! compile(job, instance)         once per (deployment job, instance)
//!   template -> release job -> source blob -> reader -> job description
//!   job description declares package names -> memoized runtime packages
//!   job descriptions + instance -> archive compiler -> blob store -> record
//! ```
//!
//! # Modules
//!
//! - [`compiler`] - the [`TemplatesCompiler`](compiler::TemplatesCompiler) orchestrator
//! - [`repo`] - generic repository capability, memory and JSON-file backends
//! - [`blobstore`] - blob store trait, blob reference URLs, local content store
//! - [`reader`] - job source readers
//! - [`templating`] - archive compiler trait and the Tera renderer
//! - [`cache`] - per-key single-flight locks
//! - [`models`] - release, deployment and job description types
//! - [`config`] - `tplcache.toml` and wiring of a file-backed compiler
//! - [`core`] - error types
//! - [`cli`] - the `tplcache` command line
//!
//! # Example
//!
//! ```rust,no_run
//! use tplcache::config::CompilerConfig;
//! use tplcache::models::{DeploymentJob, Instance, Release};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let compiler = CompilerConfig::load(None).await?.build_compiler();
//!
//! let release = Release::from_yaml_file("release.yml".as_ref())?;
//! compiler.precompile(&release).await?;
//!
//! let job = DeploymentJob::new("router", ["router_conf"]);
//! let instance = Instance::new("router", 0);
//! let record = compiler.compile(&job, &instance).await?;
//! assert_eq!(compiler.find_rendered_archive(&job, &instance).await?, record);
//! # Ok(())
//! # }
//! ```

pub mod blobstore;
pub mod cache;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod core;
pub mod models;
pub mod reader;
pub mod repo;
pub mod templating;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
