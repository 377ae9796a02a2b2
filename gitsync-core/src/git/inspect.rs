//! Repository condition inspection
//!
//! Reports whether a repository is in the middle of a rebase, merge,
//! cherry-pick or bisect, and whether its working tree has uncommitted work.
//! Nothing here writes to the repository.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::repo::GitRepo;
use super::runner::GitRunner;
use super::status::has_uncommitted_changes;
use crate::{Error, Result};

/// An operation git left unfinished in the metadata directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterruptedOperation {
    /// `git rebase -i` (`rebase-merge/interactive`)
    RebaseInteractive,
    /// Merge-backend rebase (`rebase-merge/`)
    RebaseMerge,
    /// `git am` or apply-backend rebase (`rebase-apply/`)
    AmRebase,
    /// Merge awaiting commit (`MERGE_HEAD`)
    Merging,
    /// Cherry-pick awaiting commit (`CHERRY_PICK_HEAD`)
    CherryPicking,
    /// Bisect session (`BISECT_LOG`)
    Bisecting,
}

impl InterruptedOperation {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::RebaseInteractive => "interactive rebase",
            Self::RebaseMerge => "rebase",
            Self::AmRebase => "am/rebase-apply",
            Self::Merging => "merge",
            Self::CherryPicking => "cherry-pick",
            Self::Bisecting => "bisect",
        }
    }

    /// Whether this is one of the rebase family
    pub fn is_rebase(&self) -> bool {
        matches!(
            self,
            Self::RebaseInteractive | Self::RebaseMerge | Self::AmRebase
        )
    }
}

impl fmt::Display for InterruptedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of a repository's state at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryCondition {
    /// Path that was inspected
    pub path: PathBuf,
    /// Metadata directory, absent when `not_a_repository`
    pub git_dir: Option<PathBuf>,
    /// No repository contains `path`
    pub not_a_repository: bool,
    /// Unfinished operations in precedence order; empty means none
    pub operations: Vec<InterruptedOperation>,
    /// Repository has no working tree
    pub bare: bool,
    /// Working tree has uncommitted changes
    pub dirty: bool,
}

impl RepositoryCondition {
    /// Condition for a path outside any repository
    pub fn not_a_repository(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            git_dir: None,
            not_a_repository: true,
            operations: Vec::new(),
            bare: false,
            dirty: false,
        }
    }

    /// The operation that decides how the repository is recovered
    pub fn primary(&self) -> Option<InterruptedOperation> {
        self.operations.first().copied()
    }

    /// Whether any interrupted operation is in progress
    pub fn is_special(&self) -> bool {
        !self.operations.is_empty()
    }

    /// No interrupted operation and nothing uncommitted
    pub fn is_clean(&self) -> bool {
        !self.not_a_repository && !self.is_special() && !self.dirty
    }

    /// Fail with [`Error::NotInitialized`] unless this is a usable working tree
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.not_a_repository {
            return Err(Error::NotInitialized {
                path: self.path.clone(),
                reason: "No git repository found.".to_string(),
            });
        }
        if self.bare {
            return Err(Error::NotInitialized {
                path: self.path.clone(),
                reason: "Bare repositories have no working tree to synchronize.".to_string(),
            });
        }
        Ok(())
    }

    /// Short summary for logs and CLI output
    pub fn describe(&self) -> String {
        if self.not_a_repository {
            return "not a git repository".to_string();
        }

        let mut parts: Vec<String> = self.operations.iter().map(|op| op.to_string()).collect();
        if parts.is_empty() {
            parts.push("no operation in progress".to_string());
        }
        if self.bare {
            parts.push("bare".to_string());
        }
        parts.push(if self.dirty { "dirty" } else { "clean" }.to_string());
        parts.join(", ")
    }
}

/// Inspect the repository containing `path`
///
/// Normal states (dirty, mid-rebase, bare, not a repository at all) are
/// reported as data; only failures to run git are errors.
pub async fn inspect(runner: &dyn GitRunner, path: &Path) -> Result<RepositoryCondition> {
    let (git_dir, root, bare) = match GitRepo::try_open(path)? {
        Some(repo) => (
            repo.git_dir().to_path_buf(),
            repo.root().to_path_buf(),
            repo.is_bare(),
        ),
        None => {
            debug!(path = %path.display(), "No repository found");
            return Ok(RepositoryCondition::not_a_repository(path));
        }
    };

    let operations = probe_markers(&git_dir);

    let dirty = if bare {
        false
    } else {
        let status = runner.run(&["status", "--porcelain"], &root).await?;
        if !status.success() {
            warn!(
                path = %root.display(),
                stderr = %status.stderr.trim(),
                "git status failed; treating working tree as clean"
            );
        }
        status.success() && has_uncommitted_changes(&status.stdout)
    };

    let condition = RepositoryCondition {
        path: path.to_path_buf(),
        git_dir: Some(git_dir),
        not_a_repository: false,
        operations,
        bare,
        dirty,
    };

    debug!(path = %path.display(), condition = %condition.describe(), "Inspected repository");
    Ok(condition)
}

/// Detect unfinished operations from marker files in the metadata directory
///
/// The rebase markers are mutually exclusive by precedence; merge, cherry-pick
/// and bisect are independent and may appear together.
pub fn probe_markers(git_dir: &Path) -> Vec<InterruptedOperation> {
    let mut operations = Vec::new();

    let rebase_merge = git_dir.join("rebase-merge");
    if rebase_merge.join("interactive").exists() {
        operations.push(InterruptedOperation::RebaseInteractive);
    } else if rebase_merge.is_dir() {
        operations.push(InterruptedOperation::RebaseMerge);
    } else if git_dir.join("rebase-apply").is_dir() {
        operations.push(InterruptedOperation::AmRebase);
    }

    if git_dir.join("MERGE_HEAD").exists() {
        operations.push(InterruptedOperation::Merging);
    }
    if git_dir.join("CHERRY_PICK_HEAD").exists() {
        operations.push(InterruptedOperation::CherryPicking);
    }
    if git_dir.join("BISECT_LOG").exists() {
        operations.push(InterruptedOperation::Bisecting);
    }

    operations
}

/// Read a marker file git wrote for an operation, trimmed
pub(crate) fn read_marker(git_dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(git_dir.join(name))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
