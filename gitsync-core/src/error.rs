//! Error types for gitsync

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for gitsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for gitsync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required parameter (remote URL, token, identity) was not supplied
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// The target path is not a working tree gitsync can synchronize
    #[error("Working tree not ready for sync: {}. {reason}", .path.display())]
    NotInitialized {
        /// Path that was inspected
        path: PathBuf,
        /// What made the path unusable
        reason: String,
    },

    /// A push/merge/rebase failed and the repository is not in sync with the remote
    #[error("Reconciliation failed for {session}:\n{diagnostics}")]
    ReconciliationFailed {
        /// Session description with credentials redacted
        session: String,
        /// Captured git diagnostics
        diagnostics: String,
    },

    /// Automated recovery could not bring the repository out of an interrupted operation
    #[error("Unresolvable conflict during {operation}; manual resolution required (conflicting paths: {})", format_paths(.conflicts))]
    UnresolvableConflict {
        /// The interrupted operation that remains in progress
        operation: String,
        /// Paths still carrying conflict markers
        conflicts: Vec<String>,
    },

    /// Every step reported success but local and remote still differ
    #[error("Internal invariant violated: run finished cleanly but repository is {state}, expected equal")]
    InternalInvariant {
        /// Divergence observed during verification
        state: String,
    },

    /// Conflict resolution was entered too many times within one run
    #[error("Dead loop detected: conflict resolution entered more than {0} times in one run")]
    RetryBoundExceeded(u32),

    /// A git command did not finish in time
    #[error("git {command} timed out after {timeout:?}")]
    Timeout {
        /// Subcommand that timed out
        command: String,
        /// Configured limit
        timeout: Duration,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// libgit2 error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether re-running the whole sync later may succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ReconciliationFailed { .. } | Error::Timeout { .. })
    }

    /// Whether the error asks for a human to look at the repository
    pub fn needs_manual_resolution(&self) -> bool {
        matches!(self, Error::UnresolvableConflict { .. })
    }
}

fn format_paths(paths: &[String]) -> String {
    if paths.is_empty() {
        "none reported".to_string()
    } else {
        paths.join(", ")
    }
}
