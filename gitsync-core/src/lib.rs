//! gitsync core - keeps a working copy and its remote on the same commit
//!
//! A sync run commits local changes, fetches, classifies how local and remote
//! history relate and reconciles them by pushing, fast-forwarding or
//! rebasing. Repositories left mid-rebase or mid-merge by an earlier run are
//! recovered before anything else happens.

pub mod config;
pub mod error;
pub mod git;
pub mod secrets;
pub mod sync;

pub use config::{CliOverrides, Config};
pub use error::{Error, Result};
pub use secrets::Secrets;
pub use sync::{Reconciler, SyncOutcome, SyncRequest};
