//! Configuration management for gitsync
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GITSYNC_*)
//! 3. Config file (~/.config/gitsync/config.toml)
//! 4. Default values

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::git::GitCli;
use crate::sync::{default_commit_message, Identity, DEFAULT_REMOTE, DEFAULT_RESOLUTION_CEILING};
use crate::{Error, Result};

/// How the git executable is run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Path to the git executable
    pub path: String,

    /// Kill a single git command after this long
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            path: "git".to_string(),
            timeout: None,
        }
    }
}

impl GitConfig {
    /// Runner for this configuration
    pub fn runner(&self) -> GitCli {
        GitCli::new()
            .with_path(&self.path)
            .with_timeout(self.timeout)
    }
}

/// What a sync run does
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Remote name
    pub remote: String,

    /// Branch to reconcile; a run on any other checked-out branch is refused
    pub branch: Option<String>,

    /// Commit message prefix; a timestamp is appended
    pub message: Option<String>,

    /// Pathspec patterns never committed
    pub ignore: Vec<String>,

    /// How often one run may enter conflict resolution
    pub resolution_ceiling: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            branch: None,
            message: None,
            ignore: Vec::new(),
            resolution_ceiling: DEFAULT_RESOLUTION_CEILING,
        }
    }
}

impl SyncConfig {
    /// Commit message for a run starting now
    pub fn commit_message(&self) -> String {
        match &self.message {
            Some(prefix) => {
                let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z");
                format!("{} {}", prefix.trim_end(), stamp)
            }
            None => default_commit_message(),
        }
    }
}

/// Committer identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// `user.name` for sync commits
    pub name: Option<String>,

    /// `user.email` for sync commits
    pub email: Option<String>,
}

impl IdentityConfig {
    /// The identity, or `MissingParameter` naming what is absent
    pub fn identity(&self) -> Result<Identity> {
        let name = self
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::MissingParameter("author name".to_string()))?;
        let email = self
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| Error::MissingParameter("author email".to_string()))?;
        Ok(Identity::new(name, email))
    }
}

/// Overrides supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub git_path: Option<String>,
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Git executable configuration
    pub git: GitConfig,

    /// Sync behaviour
    pub sync: SyncConfig,

    /// Committer identity
    pub identity: IdentityConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/gitsync/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gitsync").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GITSYNC_GIT_PATH: Path to git executable
    /// - GITSYNC_REMOTE: Remote name
    /// - GITSYNC_BRANCH: Branch to reconcile
    /// - GITSYNC_AUTHOR_NAME / GITSYNC_AUTHOR_EMAIL: Committer identity
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = var("GITSYNC_GIT_PATH") {
            self.git.path = path;
        }
        if let Some(remote) = var("GITSYNC_REMOTE") {
            self.sync.remote = remote;
        }
        if let Some(branch) = var("GITSYNC_BRANCH") {
            self.sync.branch = Some(branch);
        }
        if let Some(name) = var("GITSYNC_AUTHOR_NAME") {
            self.identity.name = Some(name);
        }
        if let Some(email) = var("GITSYNC_AUTHOR_EMAIL") {
            self.identity.email = Some(email);
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(path) = overrides.git_path {
            self.git.path = path;
        }
        if let Some(remote) = overrides.remote {
            self.sync.remote = remote;
        }
        if let Some(branch) = overrides.branch {
            self.sync.branch = Some(branch);
        }
        if let Some(name) = overrides.author_name {
            self.identity.name = Some(name);
        }
        if let Some(email) = overrides.author_email {
            self.identity.email = Some(email);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(overrides: CliOverrides) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(overrides))
    }
}
