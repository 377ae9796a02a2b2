//! Inputs and per-run context of a sync

use std::fmt;
use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;

use crate::git::credentials::{is_https, redact};
use crate::git::GitRepo;
use crate::{Error, Result};

/// Default name of the remote gitsync reconciles with
pub const DEFAULT_REMOTE: &str = "origin";

/// Committer identity used for sync commits and recovery actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// `user.name`
    pub name: String,
    /// `user.email`
    pub email: String,
}

impl Identity {
    /// Create an identity
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// `-c user.name=… -c user.email=…` prefix for git commands that commit
    pub fn config_args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            format!("user.name={}", self.name),
            "-c".to_string(),
            format!("user.email={}", self.email),
        ]
    }
}

/// Commit message used when the caller does not supply one
pub fn default_commit_message() -> String {
    format!("Automatic sync {}", Local::now().format("%Y-%m-%d %H:%M:%S %z"))
}

/// Everything a caller supplies for one sync run
#[derive(Clone)]
pub struct SyncRequest {
    /// Any path inside the working tree
    pub workdir: PathBuf,
    /// Credential-free remote URL
    pub remote_url: String,
    /// Remote name (defaults to "origin")
    pub remote_name: String,
    /// Branch to reconcile; must be the checked-out one when given
    pub branch: Option<String>,
    /// Committer identity
    pub identity: Identity,
    /// Access token for HTTPS remotes
    pub token: Option<String>,
    /// Message for the commit of local changes
    pub message: String,
    /// Pathspec patterns never staged by the sync commit
    pub ignore: Vec<String>,
}

impl fmt::Debug for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRequest")
            .field("workdir", &self.workdir)
            .field("remote_url", &redact(&self.remote_url))
            .field("remote_name", &self.remote_name)
            .field("branch", &self.branch)
            .field("identity", &self.identity)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("message", &self.message)
            .field("ignore", &self.ignore)
            .finish()
    }
}

impl SyncRequest {
    /// Create a request with the default remote name and commit message
    pub fn new(workdir: impl Into<PathBuf>, remote_url: impl Into<String>, identity: Identity) -> Self {
        Self {
            workdir: workdir.into(),
            remote_url: remote_url.into(),
            remote_name: DEFAULT_REMOTE.to_string(),
            branch: None,
            identity,
            token: None,
            message: default_commit_message(),
            ignore: Vec::new(),
        }
    }

    /// Set the access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the commit message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Set the ignore list
    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Name the branch to reconcile; the run refuses to start if it is not checked out
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Use a remote other than "origin"
    pub fn with_remote_name(mut self, remote: impl Into<String>) -> Self {
        self.remote_name = remote.into();
        self
    }

    /// Check that everything required is present before touching the repository
    pub fn validate(&self) -> Result<()> {
        if self.remote_url.trim().is_empty() {
            return Err(Error::MissingParameter("remote URL".to_string()));
        }
        if self.remote_name.trim().is_empty() {
            return Err(Error::MissingParameter("remote name".to_string()));
        }
        if self.identity.name.trim().is_empty() || self.identity.email.trim().is_empty() {
            return Err(Error::MissingParameter(
                "committer identity (name and email)".to_string(),
            ));
        }
        if self.message.trim().is_empty() {
            return Err(Error::MissingParameter("commit message".to_string()));
        }
        let has_token = self.token.as_deref().is_some_and(|t| !t.trim().is_empty());
        if is_https(&self.remote_url) && !has_token {
            return Err(Error::MissingParameter(format!(
                "access token for HTTPS remote {}",
                redact(&self.remote_url)
            )));
        }
        Ok(())
    }
}

/// Resolved context of one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositorySession {
    /// Working tree root
    pub workdir: PathBuf,
    /// Branch being reconciled
    pub branch: String,
    /// Remote name
    pub remote_name: String,
    /// Credential-free remote URL
    pub remote_url: String,
    /// Committer identity
    pub identity: Identity,
}

impl RepositorySession {
    /// Resolve the repository root and branch for a request
    ///
    /// The branch is always the one checked out. A detached HEAD, or a
    /// requested branch other than the checked-out one, is refused with
    /// [`Error::NotInitialized`]. While a rebase or bisect is in progress the
    /// branch it started from counts as checked out.
    pub fn open(request: &SyncRequest) -> Result<Self> {
        let repo = GitRepo::open(&request.workdir)?;
        let checked_out = repo
            .checked_out_branch()?
            .ok_or_else(|| Error::NotInitialized {
                path: repo.root().to_path_buf(),
                reason: "HEAD is detached. Check out the branch to synchronize first."
                    .to_string(),
            })?;
        let branch = match &request.branch {
            Some(requested) if *requested != checked_out => {
                return Err(Error::NotInitialized {
                    path: repo.root().to_path_buf(),
                    reason: format!(
                        "Branch '{}' was requested but '{}' is checked out. Run 'git checkout {}' first.",
                        requested, checked_out, requested
                    ),
                });
            }
            _ => checked_out,
        };

        Ok(Self {
            workdir: repo.root().to_path_buf(),
            branch,
            remote_name: request.remote_name.clone(),
            remote_url: request.remote_url.clone(),
            identity: request.identity.clone(),
        })
    }

    /// `<remote>/<branch>`
    pub fn tracking_ref(&self) -> String {
        format!("{}/{}", self.remote_name, self.branch)
    }
}

impl fmt::Display for RepositorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} -> {} ({}), committer {} <{}>]",
            self.workdir.display(),
            self.branch,
            self.remote_name,
            redact(&self.remote_url),
            self.identity.name,
            self.identity.email
        )
    }
}
