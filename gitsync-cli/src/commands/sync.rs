//! Sync command - commit, fetch, reconcile and push

use std::path::PathBuf;

use clap::Args;
use gitsync_core::sync::{SyncAction, TracingSink};
use gitsync_core::{CliOverrides, Config, Reconciler, Secrets, SyncRequest};

/// Synchronize a working copy with its remote
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Remote URL, without credentials
    #[arg(long, env = "GITSYNC_REMOTE_URL")]
    remote_url: String,

    /// Working directory (any path inside the repository)
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Commit message for local changes
    #[arg(short, long)]
    message: Option<String>,

    /// Pathspec pattern to leave uncommitted (repeatable)
    #[arg(long = "ignore")]
    ignore: Vec<String>,

    /// Branch to reconcile; must be the checked-out branch
    #[arg(long)]
    branch: Option<String>,

    /// Remote name
    #[arg(long)]
    remote: Option<String>,
}

impl SyncArgs {
    /// Execute the sync command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let config = config.clone().with_cli_overrides(CliOverrides {
            remote: self.remote.clone(),
            branch: self.branch.clone(),
            ..Default::default()
        });
        let secrets = Secrets::load()?;

        let message = self
            .message
            .clone()
            .unwrap_or_else(|| config.sync.commit_message());
        let ignore = config
            .sync
            .ignore
            .iter()
            .chain(&self.ignore)
            .cloned()
            .collect();

        let mut request = SyncRequest::new(
            self.dir.clone(),
            self.remote_url.clone(),
            config.identity.identity()?,
        )
        .with_remote_name(config.sync.remote.clone())
        .with_message(message)
        .with_ignore(ignore);
        if let Some(branch) = &config.sync.branch {
            request = request.with_branch(branch.clone());
        }
        if let Some(token) = secrets.token() {
            request = request.with_token(token);
        }

        let runner = config.git.runner();
        let result = Reconciler::new(&runner, &TracingSink)
            .with_resolution_ceiling(config.sync.resolution_ceiling)
            .reconcile(&request)
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.needs_manual_resolution() {
                    eprintln!(
                        "Resolve the conflicts in {} by hand, then run gitsync again.",
                        self.dir.display()
                    );
                } else if e.is_retryable() {
                    eprintln!("The remote may be unreachable; running gitsync again may succeed.");
                }
                return Err(e.into());
            }
        };

        let action = match outcome.action {
            SyncAction::NothingToDo => "already up to date",
            SyncAction::CreatedUpstream => "created branch on remote",
            SyncAction::Pushed => "pushed local commits",
            SyncAction::FastForwarded => "fast-forwarded to remote",
            SyncAction::Rebased => "rebased onto remote and pushed",
        };
        println!(
            "{}: {}{}",
            outcome.session.tracking_ref(),
            action,
            if outcome.committed {
                " (committed local changes)"
            } else {
                ""
            }
        );

        Ok(())
    }
}
