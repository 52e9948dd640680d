//! Error handling for tplcache
//!
//! Errors fall into two classes:
//! 1. **Access errors** from repositories, the blob store, readers or the renderer.
//!    These are propagated as [`anyhow::Error`] wrapped with context naming the job,
//!    template or instance being processed.
//! 2. **Consistency errors** ([`TplError::ExpectedToFind`]) raised when a record that a
//!    previous phase must have established is missing (for example a template that was
//!    never registered by `precompile`). They signal an ordering bug upstream and are
//!    never retried.
//!
//! Use [`user_friendly_error`] to turn any error into an [`ErrorContext`] for CLI output.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tplcache::core::{TplError, user_friendly_error};
//!
//! let err = anyhow::Error::from(TplError::ExpectedToFind {
//!     what: "dep-template -> rel-job".to_string(),
//!     key: "router_conf".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for tplcache operations.
#[derive(Error, Debug)]
pub enum TplError {
    /// A record that an earlier phase must have created is missing.
    #[error("Expected to find {what} {key}")]
    ExpectedToFind {
        /// The kind of link that was expected, e.g. `job source blob`
        what: String,
        /// The key that was looked up
        key: String,
    },

    /// The release contains a nil package entry or is otherwise malformed.
    #[error("Malformed release '{release}': {reason}")]
    MalformedRelease {
        /// Release name
        release: String,
        /// Why the release was rejected
        reason: String,
    },

    /// The deployment job cannot be compiled as given.
    #[error("Invalid deployment job '{job}': {reason}")]
    InvalidDeploymentJob {
        /// Deployment job name
        job: String,
        /// Why the job was rejected
        reason: String,
    },

    /// A blob reference URL could not be parsed.
    #[error("Invalid blob reference '{url}': {reason}")]
    InvalidBlobRef {
        /// The offending URL
        url: String,
        /// Parse failure description
        reason: String,
    },

    /// The blob store has no blob with the given id.
    #[error("Blob '{blob_id}' not found in blob store")]
    BlobNotFound {
        /// Requested blob id
        blob_id: String,
    },

    /// Stored blob content does not match its fingerprint.
    #[error("Fingerprint mismatch for blob '{blob_id}': expected {expected}, got {actual}")]
    FingerprintMismatch {
        /// Blob id that failed verification
        blob_id: String,
        /// Fingerprint carried by the blob reference
        expected: String,
        /// Fingerprint computed from stored content
        actual: String,
    },

    /// `read` was called twice on the same job reader.
    #[error("Job archive reader for '{url}' was already consumed")]
    ReaderAlreadyConsumed {
        /// Blob reference URL the reader is bound to
        url: String,
    },

    /// The job manifest inside a job archive is missing or invalid.
    #[error("Invalid job manifest in '{archive}': {reason}")]
    JobManifestInvalid {
        /// Archive being read
        archive: String,
        /// Why the manifest is invalid
        reason: String,
    },

    /// A per-key guard could not be acquired in time.
    #[error("Timed out after {seconds}s waiting for lock '{key}'")]
    LockTimeout {
        /// The lock key
        key: String,
        /// Configured timeout in seconds
        seconds: u64,
    },

    /// Configuration file problems.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },
}

impl TplError {
    /// Build an [`TplError::ExpectedToFind`] error.
    pub fn expected(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ExpectedToFind {
            what: what.into(),
            key: key.into(),
        }
    }

    /// Whether this error signals a broken invariant between phases rather than
    /// an access failure.
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, Self::ExpectedToFind { .. } | Self::MalformedRelease { .. })
    }
}

/// Find the first [`TplError`] anywhere in an error chain.
pub fn find_tpl_error(error: &anyhow::Error) -> Option<&TplError> {
    error.chain().find_map(|cause| cause.downcast_ref::<TplError>())
}

/// Whether an error chain contains a consistency error.
pub fn is_consistency_error(error: &anyhow::Error) -> bool {
    find_tpl_error(error).is_some_and(TplError::is_consistency_error)
}

/// Error wrapper that adds user-facing details and suggestions.
#[derive(Debug)]
pub struct ErrorContext {
    /// Full error message including context chain
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with a message and no suggestions.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// The message keeps the full context chain (`outer: inner: root`) so the failing
/// job and stage stay visible; suggestions are chosen from the root [`TplError`].
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let message = format!("{error:#}");

    match find_tpl_error(&error) {
        Some(TplError::ExpectedToFind { .. }) => ErrorContext::new(message)
            .with_details(
                "A record that precompile should have created is missing; \
                 this points at a stale state directory or a skipped precompile",
            )
            .with_suggestion("Run 'tplcache precompile' for the release before compiling"),
        Some(TplError::MalformedRelease { .. }) => ErrorContext::new(message)
            .with_suggestion("Check the release manifest for empty package entries"),
        Some(TplError::FingerprintMismatch { .. }) => ErrorContext::new(message)
            .with_details("Stored blob content no longer matches its recorded fingerprint")
            .with_suggestion("Remove the corrupted blob and re-run precompile"),
        Some(TplError::LockTimeout { .. }) => ErrorContext::new(message)
            .with_suggestion("Another compile may be running; retry or raise lock_timeout_secs"),
        Some(TplError::ConfigError { .. }) => ErrorContext::new(message)
            .with_suggestion("Check the syntax of tplcache.toml"),
        _ => ErrorContext::new(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_expected_to_find_message() {
        let err = TplError::expected("job source blob", "router");
        assert_eq!(err.to_string(), "Expected to find job source blob router");
        assert!(err.is_consistency_error());
    }

    #[test]
    fn test_access_errors_are_not_consistency_errors() {
        let err = TplError::BlobNotFound {
            blob_id: "abc".to_string(),
        };
        assert!(!err.is_consistency_error());
    }

    #[test]
    fn test_consistency_error_found_through_context() {
        let err: anyhow::Result<()> = Err(TplError::expected("packages by job", "router").into());
        let err = err.context("Preparing runtime dep packages").unwrap_err();

        assert!(is_consistency_error(&err));
        let ctx = user_friendly_error(err);
        assert!(ctx.message.starts_with("Preparing runtime dep packages: "));
        assert!(ctx.suggestion.is_some());
    }

    #[test]
    fn test_io_failure_is_an_access_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = anyhow::Error::from(io).context("Reading job router");

        assert!(find_tpl_error(&err).is_none());
        assert!(!is_consistency_error(&err));
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn test_plain_anyhow_error_has_no_suggestion() {
        let ctx = user_friendly_error(anyhow::anyhow!("boom"));
        assert_eq!(ctx.to_string(), "boom");
    }
}
