//! Git plumbing used by the sync engine
//!
//! Repository discovery goes through `git2`; anything that changes the
//! repository runs the git binary through a [`GitRunner`].

pub mod credentials;
pub mod divergence;
pub mod inspect;
mod repo;
pub mod runner;
pub mod status;

pub use credentials::CredentialManager;
pub use divergence::{classify, DivergenceState};
pub use inspect::{inspect, InterruptedOperation, RepositoryCondition};
pub use repo::GitRepo;
pub use runner::{FailureKind, GitCli, GitOutput, GitRunner};
pub use status::{parse_status, ChangeKind, FileChange};
