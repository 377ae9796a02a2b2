//! Subprocess runner for the git binary
//!
//! Everything gitsync does to a repository goes through [`GitRunner`], so tests
//! can script git's answers and the engine never shells out directly.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::credentials::redact_text;
use crate::{Error, Result};

/// Exit code git uses for fatal errors, including transport and auth failures
pub const FATAL_EXIT_CODE: i32 = 128;

/// Captured result of one git invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// Process exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

/// Coarse classification of a failed git command, taken from its stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credentials were rejected
    Authentication,
    /// Host unreachable or connection dropped
    Network,
    /// Remote repository or ref does not exist
    NotFound,
    /// Remote refused a non-fast-forward update
    Rejected,
    /// Anything else
    Other,
}

impl GitOutput {
    /// Build a successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Build a failed output with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether git exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Classify a failure by its stderr
    pub fn failure_kind(&self) -> Option<FailureKind> {
        if self.success() {
            return None;
        }

        let stderr = self.stderr.as_str();
        let kind = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("could not read Username")
        {
            FailureKind::Authentication
        } else if stderr.contains("Could not resolve host")
            || stderr.contains("unable to access")
            || stderr.contains("Connection timed out")
        {
            FailureKind::Network
        } else if stderr.contains("couldn't find remote ref")
            || stderr.contains("not found")
            || stderr.contains("does not exist")
        {
            FailureKind::NotFound
        } else if stderr.contains("[rejected]") || stderr.contains("non-fast-forward") {
            FailureKind::Rejected
        } else {
            FailureKind::Other
        };

        Some(kind)
    }

    /// Fetch failed only because the branch does not exist on the remote yet
    pub fn is_missing_remote_ref(&self) -> bool {
        !self.success() && self.stderr.contains("couldn't find remote ref")
    }

    /// One-paragraph diagnostic for error reports, with credentials masked
    pub fn diagnostic(&self, command: &str) -> String {
        let detail = self.stderr.trim();
        let detail = redact_text(if detail.is_empty() { self.stdout.trim() } else { detail });
        match self.failure_kind() {
            Some(kind) => format!(
                "git {} exited with {} ({:?}): {}",
                command, self.exit_code, kind, detail
            ),
            None => format!("git {} succeeded", command),
        }
    }
}

/// Runs git commands in a working directory
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run git with the given arguments
    ///
    /// Returns `Err` only when the process could not be run at all; a non-zero
    /// exit is reported through [`GitOutput::exit_code`].
    async fn run(&self, args: &[&str], workdir: &Path) -> Result<GitOutput>;

    /// [`GitRunner::run`] for arguments built at runtime
    async fn run_args(&self, args: &[String], workdir: &Path) -> Result<GitOutput> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args, workdir).await
    }
}

/// The git subcommand in an argument list, skipping `-c key=value` options
pub fn subcommand<'a>(args: &[&'a str]) -> &'a str {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == "-c" {
            iter.next();
        } else if !arg.starts_with('-') {
            return *arg;
        }
    }
    ""
}

/// [`GitRunner`] backed by the git executable
#[derive(Debug, Clone)]
pub struct GitCli {
    git_path: String,
    timeout: Option<Duration>,
}

impl GitCli {
    /// Create a runner using `git` from PATH with no timeout
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
            timeout: None,
        }
    }

    /// Use a specific git executable
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.git_path = path.into();
        self
    }

    /// Kill any single git invocation that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, args: &[&str], workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.git_path);
        cmd.args(args)
            .current_dir(workdir)
            // Never block on an interactive credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitRunner for GitCli {
    async fn run(&self, args: &[&str], workdir: &Path) -> Result<GitOutput> {
        let subcommand = subcommand(args).to_string();
        let mut cmd = self.build_command(args, workdir);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| Error::Timeout {
                    command: subcommand.clone(),
                    timeout: limit,
                })?,
            None => cmd.output().await,
        }
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Config(format!(
                    "git executable not found at '{}'. Is git installed?",
                    self.git_path
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let result = GitOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            command = %subcommand,
            exit_code = result.exit_code,
            workdir = %workdir.display(),
            "git finished"
        );

        Ok(result)
    }
}
