//! Utilities shared across modules.
//!
//! - [`fs`] - directory creation, atomic writes and tolerant removal

pub mod fs;

pub use fs::{atomic_write, ensure_dir, remove_file_if_exists};
