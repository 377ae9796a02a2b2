//! Status command - repository condition and divergence from the remote

use std::path::PathBuf;

use clap::Args;
use gitsync_core::git::credentials::redact;
use gitsync_core::git::{classify, inspect, DivergenceState, GitRepo};
use gitsync_core::Config;
use serde_json::json;

/// Show the repository condition without fetching
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Working directory (any path inside the repository)
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let runner = config.git.runner();
        let condition = inspect(&runner, &self.dir).await?;

        let mut tracking: Option<(String, DivergenceState)> = None;
        let mut remote_url = None;
        let mut notes: Vec<String> = Vec::new();
        if condition.ensure_initialized().is_ok() {
            let repo = GitRepo::open(&self.dir)?;
            let remote = config.sync.remote.as_str();
            remote_url = repo.remote_url(remote)?.map(|url| redact(&url));
            match repo.checked_out_branch()? {
                Some(branch) => {
                    if let Some(configured) = config.sync.branch.as_ref().filter(|b| **b != branch) {
                        notes.push(format!(
                            "sync.branch is '{}' but '{}' is checked out; sync will refuse to run",
                            configured, branch
                        ));
                    }
                    let state = classify(&runner, repo.root(), &branch, remote).await?;
                    tracking = Some((format!("{}/{}", remote, branch), state));
                }
                None => notes.push("HEAD is detached; sync will refuse to run".to_string()),
            }
        }

        if self.json {
            let report = json!({
                "condition": condition,
                "remote_url": remote_url,
                "tracking": tracking.as_ref().map(|(r, _)| r),
                "divergence": tracking.as_ref().map(|(_, s)| s),
                "notes": notes,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("Repository: {}", self.dir.display());
        println!("  State: {}", condition.describe());
        if let Some(url) = &remote_url {
            println!("  Remote {}: {}", config.sync.remote, url);
        }
        if let Some((tracking_ref, state)) = &tracking {
            println!("  Against {}: {}", tracking_ref, state);
        }
        for note in &notes {
            println!("  Note: {}", note);
        }

        Ok(())
    }
}
