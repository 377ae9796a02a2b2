//! Progress reporting for a sync run
//!
//! A [`ProgressSink`] is handed to the reconciler explicitly; nothing in the
//! engine reaches for a global logger to report progress.

use std::fmt;

use tracing::{debug, info, warn};

/// Phase of a sync run that a progress message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Inspecting the repository before touching it
    Preflight,
    /// Recovering from an interrupted operation
    Resolve,
    /// Committing local changes
    Commit,
    /// Embedding credentials in the remote URL
    Authenticate,
    /// Updating the remote-tracking branch
    Fetch,
    /// Comparing local and remote history
    Classify,
    /// Pushing, fast-forwarding or rebasing
    Reconcile,
    /// Removing credentials from the remote URL
    Deauthenticate,
    /// Checking local and remote ended up equal
    Verify,
}

impl Step {
    /// Stable lowercase name, used as the `step` field in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Resolve => "resolve",
            Self::Commit => "commit",
            Self::Authenticate => "authenticate",
            Self::Fetch => "fetch",
            Self::Classify => "classify",
            Self::Reconcile => "reconcile",
            Self::Deauthenticate => "deauthenticate",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress, warnings and debug detail from a sync run
pub trait ProgressSink: Send + Sync {
    /// A step started or completed
    fn step(&self, step: Step, message: &str);

    /// Something failed but the run continues
    fn warn(&self, step: Step, message: &str);

    /// Low-level detail
    fn debug(&self, _step: Step, _message: &str) {}
}

/// Forwards progress to `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn step(&self, step: Step, message: &str) {
        info!(step = step.as_str(), "{}", message);
    }

    fn warn(&self, step: Step, message: &str) {
        warn!(step = step.as_str(), "{}", message);
    }

    fn debug(&self, step: Step, message: &str) {
        debug!(step = step.as_str(), "{}", message);
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn step(&self, _step: Step, _message: &str) {}

    fn warn(&self, _step: Step, _message: &str) {}
}
