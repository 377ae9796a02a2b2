//! Changes command - the uncommitted changes a sync would commit

use std::path::PathBuf;

use clap::Args;
use gitsync_core::git::{parse_status, GitRepo, GitRunner};
use gitsync_core::Config;

/// List uncommitted changes, decoded and sorted
#[derive(Args, Debug)]
pub struct ChangesArgs {
    /// Working directory (any path inside the repository)
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
}

impl ChangesArgs {
    /// Execute the changes command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let repo = GitRepo::open(&self.dir)?;
        let runner = config.git.runner();

        let output = runner.run(&["status", "--porcelain"], repo.root()).await?;
        if !output.success() {
            anyhow::bail!(output.diagnostic("status"));
        }
        let changes = parse_status(&output.stdout);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&changes)?);
            return Ok(());
        }

        if changes.is_empty() {
            println!("No uncommitted changes.");
            return Ok(());
        }

        for change in &changes {
            match &change.original_path {
                Some(from) => println!(
                    "{}{} {} (from {})",
                    change.index, change.worktree, change.path, from
                ),
                None => println!("{}{} {}", change.index, change.worktree, change.path),
            }
        }

        Ok(())
    }
}
