//! Git repository discovery and read-only properties

use std::path::{Path, PathBuf};

use git2::{BranchType, Repository};

use super::inspect::read_marker;
use crate::{Error, Result};

/// A git repository wrapper exposing the properties gitsync reads
pub struct GitRepo {
    /// The underlying git2 repository
    repo: Repository,
    /// Working tree root, or the metadata directory for bare repositories
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .field("bare", &self.is_bare())
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open the git repository containing `path`
    ///
    /// This will search upward from the given path to find the repository root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::try_open(path)?.ok_or_else(|| Error::NotInitialized {
            path: path.to_path_buf(),
            reason: "Run 'git init' first or navigate to a git repository.".to_string(),
        })
    }

    /// Open the repository containing `path`, or `None` if there is none
    pub fn try_open(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let repo = match Repository::discover(path) {
            Ok(repo) => repo,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(Error::Git(e)),
        };

        let root = repo
            .workdir()
            .unwrap_or_else(|| repo.path())
            .to_path_buf();

        Ok(Some(Self { repo, root }))
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding git metadata (`.git`, or the worktree's private dir)
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Whether the repository has no working tree
    pub fn is_bare(&self) -> bool {
        self.repo.is_bare()
    }

    /// Get the URL configured for a remote, if the remote exists
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(|u| u.to_string())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(Error::Git(e)),
        }
    }

    /// Get the current branch name
    ///
    /// Works on an unborn branch (fresh `git init`) by reading the symbolic
    /// target of HEAD. Returns `None` for a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        match self.repo.head() {
            Ok(head) if head.is_branch() => Ok(head.shorthand().map(|s| s.to_string())),
            Ok(_) => Ok(None),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let head = self.repo.find_reference("HEAD")?;
                Ok(head
                    .symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .map(|s| s.to_string()))
            }
            Err(e) => Err(Error::Git(e)),
        }
    }

    /// Branch an interrupted rebase or bisect will return to
    ///
    /// Both leave HEAD detached while they run; git records the branch they
    /// started from in the metadata directory.
    pub fn interrupted_branch(&self) -> Option<String> {
        let git_dir = self.git_dir();
        let rebasing = ["rebase-merge/head-name", "rebase-apply/head-name"]
            .iter()
            .find_map(|marker| read_marker(git_dir, marker))
            .and_then(|name| name.strip_prefix("refs/heads/").map(|s| s.to_string()));
        if rebasing.is_some() {
            return rebasing;
        }

        read_marker(git_dir, "BISECT_START")
            .filter(|name| self.repo.find_branch(name, BranchType::Local).is_ok())
    }

    /// Branch the working tree is on, counting an interrupted rebase or bisect
    pub fn checked_out_branch(&self) -> Result<Option<String>> {
        Ok(self.current_branch()?.or_else(|| self.interrupted_branch()))
    }
}
