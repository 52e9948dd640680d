//! Shared data models for tplcache operations
//!
//! Three families of types flow through the compiler:
//! - [`release`]: what a release ships (jobs with source tarballs, packages)
//! - [`deployment`]: what a deployment asks for (jobs referencing templates, instances)
//! - [`job`]: the structured description parsed out of a job source archive

pub mod deployment;
pub mod job;
pub mod release;

pub use deployment::{DeploymentJob, Instance, Template};
pub use job::{JobDescription, JobManifest, JobTemplate, PackageRef, PropertyDefinition};
pub use release::{Release, ReleaseJob, ReleaseJobKey, ReleasePackage};
