//! Real-git fixtures: a bare remote plus working copies cloned from it

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use gitsync_core::sync::Identity;
use gitsync_core::SyncRequest;
use tempfile::TempDir;

/// Whether a usable git binary is on PATH
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git, returning the raw output without checking the status
pub fn git_raw(dir: &Path, args: &[&str]) -> Output {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap()
}

/// Run git and return trimmed stdout, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = git_raw(dir, args);
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure(dir: &Path) {
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Write `name` and commit it
pub fn commit_file(dir: &Path, name: &str, content: &str) -> String {
    fs::write(dir.join(name), content).unwrap();
    git(dir, &["add", name]);
    git(dir, &["commit", "-m", &format!("Update {}", name)]);
    head(dir)
}

/// Commit id of HEAD
pub fn head(dir: &Path) -> String {
    git(dir, &["rev-parse", "HEAD"])
}

pub struct Fixture {
    root: TempDir,
    /// Bare repository acting as the remote
    pub remote: PathBuf,
    /// Working copy under test; has no remote configured yet
    pub local: PathBuf,
}

impl Fixture {
    /// Empty bare remote and a local repository with one commit
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let remote = root.path().join("remote.git");
        let local = root.path().join("local");
        fs::create_dir_all(&remote).unwrap();
        fs::create_dir_all(&local).unwrap();

        git(&remote, &["init", "--bare", "-b", "main"]);
        git(&local, &["init", "-b", "main"]);
        configure(&local);
        commit_file(&local, "README.md", "# notes\n");

        Self {
            root,
            remote,
            local,
        }
    }

    /// Remote URL as gitsync receives it
    pub fn url(&self) -> String {
        self.remote.to_string_lossy().into_owned()
    }

    /// Second working copy cloned from the remote
    pub fn peer(&self, name: &str) -> PathBuf {
        let path = self.root.path().join(name);
        git(
            self.root.path(),
            &["clone", "-q", &self.url(), &path.to_string_lossy()],
        );
        configure(&path);
        path
    }

    /// Commit id the remote's `main` points at
    pub fn remote_head(&self) -> String {
        git(&self.remote, &["rev-parse", "main"])
    }

    /// Sync request for the local working copy
    pub fn request(&self) -> SyncRequest {
        SyncRequest::new(
            self.local.clone(),
            self.url(),
            Identity::new("Sync Bot", "bot@example.com"),
        )
        .with_message("sync")
    }
}
