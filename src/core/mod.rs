//! Core types shared across tplcache.
//!
//! The only submodule today is [`error`], which defines [`TplError`] and the
//! user-facing [`ErrorContext`]. Fallible operations elsewhere return
//! [`anyhow::Result`] and attach context naming the job, template or instance
//! being processed; domain failures are raised as [`TplError`] variants so callers
//! can tell a consistency violation from a transient access error.

pub mod error;

pub use error::{
    ErrorContext, TplError, find_tpl_error, is_consistency_error, user_friendly_error,
};
