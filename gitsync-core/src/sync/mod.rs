//! Synchronizing a working copy with its remote
//!
//! [`Reconciler::reconcile`] is the entry point. It commits local changes,
//! brings local and remote history together and verifies both ended up on the
//! same commit, recovering from interrupted rebases and merges on the way.

pub mod progress;
pub mod reconcile;
pub mod resolve;
pub mod session;

pub use progress::{NullSink, ProgressSink, Step, TracingSink};
pub use reconcile::{Reconciler, SyncAction, SyncOutcome};
pub use resolve::{
    Attempt, ConflictResolver, Resolution, ResolutionBudget, DEFAULT_RESOLUTION_CEILING,
};
pub use session::{default_commit_message, Identity, RepositorySession, SyncRequest, DEFAULT_REMOTE};
