//! Secrets management for gitsync
//!
//! The remote access token is kept out of `config.toml` so configuration can
//! be shared without leaking it. The secrets file lives at
//! `~/.config/gitsync/secrets.toml` and must have restrictive permissions
//! (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variable (GITSYNC_TOKEN)
//! 2. Secrets file (~/.config/gitsync/secrets.toml)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Environment variable holding the remote access token
pub const TOKEN_ENV: &str = "GITSYNC_TOKEN";

const TEMPLATE: &str = r#"# gitsync secrets
# This file contains credentials - do not share or commit to version control
#
# IMPORTANT: This file must have restrictive permissions (chmod 600)

[remote]
# Access token for HTTPS remotes. It is written into the remote URL only
# while fetching and pushing, and removed again afterwards.
token = ""
"#;

/// Secrets structure
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// Remote credentials
    pub remote: RemoteSecrets,
}

/// Credentials for the sync remote
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteSecrets {
    /// Personal access token
    pub token: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("token", &self.remote.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_secrets_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path).map_err(Error::Io)?.permissions().mode();

            // Readable by group or others
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }

            debug!(path = %path.display(), mode = format!("{:o}", mode & 0o777), "Secrets file permissions OK");
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        if let Some(token) = secrets.remote.token.as_mut() {
            *token = token.trim().to_string();
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/gitsync/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gitsync").join("secrets.toml"))
    }

    /// Remote token with environment variable override
    ///
    /// Priority: GITSYNC_TOKEN env var > secrets file
    pub fn token(&self) -> Option<String> {
        self.token_with(std::env::var(TOKEN_ENV).ok())
    }

    fn token_with(&self, env: Option<String>) -> Option<String> {
        if let Some(token) = env.map(|t| t.trim().to_string()) {
            if !token.is_empty() {
                debug!("Using remote token from {} environment variable", TOKEN_ENV);
                return Some(token);
            }
        }

        match self.remote.token.as_deref() {
            Some(token) if !token.is_empty() => {
                debug!("Using remote token from secrets file");
                Some(token.to_string())
            }
            _ => None,
        }
    }

    /// Create a template secrets file at the default location
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;
        Self::create_template_at(&path)?;
        Ok(path)
    }

    /// Write the template to `path` with owner-only permissions
    ///
    /// Creates parent directories as needed and never overwrites.
    pub fn create_template_at(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }

        if path.exists() {
            return Err(Error::Config(format!(
                "Secrets file already exists at {}",
                path.display()
            )));
        }

        std::fs::write(path, TEMPLATE).map_err(Error::Io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms).map_err(Error::Io)?;
        }

        warn!(path = %path.display(), "Created secrets template - please edit and add your token");
        Ok(())
    }
}
