//! Integration test suite for tplcache
//!
//! End-to-end tests over the real stack: job tarballs in a local blob store,
//! tarball readers, the Tera renderer and JSON-file repositories.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **cli**: the `tplcache` binary
//! - **end_to_end**: precompile / compile / lookups in one process
//! - **persistence**: state shared by compilers built from the same config

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod end_to_end;
mod persistence;
