//! Automated recovery from interrupted git operations
//!
//! Each call makes at most two attempts: finish the operation with git's own
//! `--continue`, then abort it and run it again from scratch. Aborting restores
//! the state git recorded before the operation and re-running replays the same
//! commits, so committed work is never dropped. A conflict that survives both
//! attempts is left in place for a human.

use std::path::Path;

use crate::git::inspect::{inspect, read_marker, InterruptedOperation, RepositoryCondition};
use crate::git::runner::{GitOutput, GitRunner};
use crate::git::status::decode_path;
use crate::{Error, Result};

use super::progress::{ProgressSink, Step};
use super::session::RepositorySession;

/// How many times one run may enter conflict resolution by default
///
/// A run enters at most twice: at preflight and after a diverged rebase. A
/// ceiling of 1 makes the second entry fail with [`Error::RetryBoundExceeded`].
pub const DEFAULT_RESOLUTION_CEILING: u32 = 2;

/// One recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Finish the operation if no conflicting paths remain
    Continue,
    /// Abort the operation and run it again
    AbortAndReapply,
}

impl Attempt {
    /// Attempts made by a single resolution, in order
    pub const SEQUENCE: [Attempt; 2] = [Attempt::Continue, Attempt::AbortAndReapply];
}

/// Counts how often one run enters conflict resolution
///
/// Rebase can re-diverge and land back in resolution; the ceiling stops that
/// from oscillating forever.
#[derive(Debug, Clone)]
pub struct ResolutionBudget {
    entered: u32,
    ceiling: u32,
}

impl ResolutionBudget {
    /// Budget allowing `ceiling` entries
    pub fn new(ceiling: u32) -> Self {
        Self { entered: 0, ceiling }
    }

    /// Record an entry, failing once the ceiling is exceeded
    pub fn enter(&mut self) -> Result<u32> {
        if self.entered >= self.ceiling {
            return Err(Error::RetryBoundExceeded(self.ceiling));
        }
        self.entered += 1;
        Ok(self.entered)
    }

    /// Entries so far
    pub fn entered(&self) -> u32 {
        self.entered
    }
}

impl Default for ResolutionBudget {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLUTION_CEILING)
    }
}

/// Result of a resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No interrupted operation remains
    Resolved(RepositoryCondition),
    /// Both attempts failed; the repository is still mid-operation
    NeedsManualResolution {
        /// Condition after the last attempt
        condition: RepositoryCondition,
        /// Paths with unresolved conflicts
        conflicts: Vec<String>,
    },
}

impl Resolution {
    /// Whether the repository left its special state
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    /// Convert an unresolved outcome into [`Error::UnresolvableConflict`]
    pub fn into_result(self) -> Result<RepositoryCondition> {
        match self {
            Resolution::Resolved(condition) => Ok(condition),
            Resolution::NeedsManualResolution {
                condition,
                conflicts,
            } => Err(Error::UnresolvableConflict {
                operation: condition
                    .primary()
                    .map(|op| op.to_string())
                    .unwrap_or_else(|| "unknown operation".to_string()),
                conflicts,
            }),
        }
    }
}

/// Drives recovery of a repository stuck in an interrupted operation
pub struct ConflictResolver<'a> {
    runner: &'a dyn GitRunner,
    session: &'a RepositorySession,
    sink: &'a dyn ProgressSink,
}

impl<'a> ConflictResolver<'a> {
    /// Create a resolver for one session
    pub fn new(
        runner: &'a dyn GitRunner,
        session: &'a RepositorySession,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            runner,
            session,
            sink,
        }
    }

    /// Try to bring the repository out of `condition`'s interrupted operation
    ///
    /// Fails with [`Error::RetryBoundExceeded`] when `budget` is exhausted and
    /// with [`Error::NotInitialized`] if the repository disappears underneath.
    pub async fn resolve(
        &self,
        condition: RepositoryCondition,
        budget: &mut ResolutionBudget,
    ) -> Result<Resolution> {
        let entry = budget.enter()?;
        let mut condition = condition;

        for attempt in Attempt::SEQUENCE {
            let Some(operation) = condition.primary() else {
                return Ok(Resolution::Resolved(condition));
            };

            self.sink.step(
                Step::Resolve,
                &format!(
                    "Recovering from interrupted {} ({:?}, entry {})",
                    operation, attempt, entry
                ),
            );

            self.ensure_identity().await?;
            let git_dir = condition
                .git_dir
                .clone()
                .unwrap_or_else(|| self.session.workdir.join(".git"));
            self.apply(attempt, operation, &git_dir).await?;

            condition = inspect(self.runner, &self.session.workdir).await?;
            condition.ensure_initialized()?;

            if !condition.is_special() {
                self.sink
                    .step(Step::Resolve, &format!("Recovered from interrupted {}", operation));
                return Ok(Resolution::Resolved(condition));
            }
        }

        let conflicts = self.conflicting_paths().await?;
        self.sink.warn(
            Step::Resolve,
            &format!(
                "Could not recover automatically ({}); {} conflicting path(s)",
                condition.describe(),
                conflicts.len()
            ),
        );
        Ok(Resolution::NeedsManualResolution {
            condition,
            conflicts,
        })
    }

    /// Make sure commits created during recovery have an author
    async fn ensure_identity(&self) -> Result<()> {
        let identity = &self.session.identity;
        for (key, value) in [("user.name", &identity.name), ("user.email", &identity.email)] {
            let output = self
                .runner
                .run(&["config", key, value.as_str()], &self.session.workdir)
                .await?;
            if !output.success() {
                self.sink
                    .warn(Step::Resolve, &output.diagnostic(&format!("config {}", key)));
            }
        }
        Ok(())
    }

    async fn apply(
        &self,
        attempt: Attempt,
        operation: InterruptedOperation,
        git_dir: &Path,
    ) -> Result<()> {
        match attempt {
            Attempt::Continue => self.continue_operation(operation, git_dir).await,
            Attempt::AbortAndReapply => self.abort_and_reapply(operation, git_dir).await,
        }
    }

    async fn continue_operation(
        &self,
        operation: InterruptedOperation,
        git_dir: &Path,
    ) -> Result<()> {
        if operation == InterruptedOperation::Bisecting {
            self.git(&["bisect", "reset"]).await?;
            return Ok(());
        }

        let conflicts = self.conflicting_paths().await?;
        if !conflicts.is_empty() {
            self.sink.debug(
                Step::Resolve,
                &format!("{} conflicting path(s) remain; not continuing", conflicts.len()),
            );
            return Ok(());
        }

        let action = match operation {
            InterruptedOperation::AmRebase if is_mailbox_apply(git_dir) => "am",
            InterruptedOperation::RebaseInteractive
            | InterruptedOperation::RebaseMerge
            | InterruptedOperation::AmRebase => "rebase",
            InterruptedOperation::Merging => "merge",
            InterruptedOperation::CherryPicking => "cherry-pick",
            InterruptedOperation::Bisecting => return Ok(()),
        };

        self.git_with_identity(&["-c", "core.editor=true", action, "--continue"])
            .await?;
        Ok(())
    }

    async fn abort_and_reapply(
        &self,
        operation: InterruptedOperation,
        git_dir: &Path,
    ) -> Result<()> {
        match operation {
            InterruptedOperation::RebaseInteractive
            | InterruptedOperation::RebaseMerge
            | InterruptedOperation::AmRebase => {
                let onto = read_marker(git_dir, "rebase-merge/onto")
                    .or_else(|| read_marker(git_dir, "rebase-apply/onto"));
                let abort = if is_mailbox_apply(git_dir) { "am" } else { "rebase" };

                let aborted = self.git(&[abort, "--abort"]).await?;
                if aborted.success() {
                    if let Some(onto) = onto {
                        self.git_with_identity(&["rebase", onto.as_str()]).await?;
                    }
                }
            }
            InterruptedOperation::Merging => {
                let head = first_line(read_marker(git_dir, "MERGE_HEAD"));
                let aborted = self.git(&["merge", "--abort"]).await?;
                if let (true, Some(head)) = (aborted.success(), head) {
                    self.git_with_identity(&["merge", "--no-edit", head.as_str()])
                        .await?;
                }
            }
            InterruptedOperation::CherryPicking => {
                let head = first_line(read_marker(git_dir, "CHERRY_PICK_HEAD"));
                let aborted = self.git(&["cherry-pick", "--abort"]).await?;
                if let (true, Some(head)) = (aborted.success(), head) {
                    self.git_with_identity(&["cherry-pick", head.as_str()]).await?;
                }
            }
            InterruptedOperation::Bisecting => {
                self.git(&["bisect", "reset"]).await?;
            }
        }
        Ok(())
    }

    /// Paths git reports as unmerged
    pub async fn conflicting_paths(&self) -> Result<Vec<String>> {
        let output = self
            .runner
            .run(
                &["diff", "--name-only", "--diff-filter=U"],
                &self.session.workdir,
            )
            .await?;
        if !output.success() {
            return Ok(Vec::new());
        }
        Ok(output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(decode_path)
            .collect())
    }

    async fn git(&self, args: &[&str]) -> Result<GitOutput> {
        let output = self.runner.run(args, &self.session.workdir).await?;
        self.report(args, &output);
        Ok(output)
    }

    async fn git_with_identity(&self, args: &[&str]) -> Result<GitOutput> {
        let mut full = self.session.identity.config_args();
        full.extend(args.iter().map(|a| a.to_string()));
        let output = self.runner.run_args(&full, &self.session.workdir).await?;
        self.report(args, &output);
        Ok(output)
    }

    fn report(&self, args: &[&str], output: &GitOutput) {
        let command = args.join(" ");
        if output.success() {
            self.sink.debug(Step::Resolve, &format!("git {} succeeded", command));
        } else {
            self.sink.warn(Step::Resolve, &output.diagnostic(&command));
        }
    }
}

/// `rebase-apply/` belongs to `git am` rather than an apply-backend rebase
fn is_mailbox_apply(git_dir: &Path) -> bool {
    git_dir.join("rebase-apply").join("applying").exists()
}

fn first_line(marker: Option<String>) -> Option<String> {
    marker.and_then(|m| m.lines().next().map(|l| l.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::progress::NullSink;
    use crate::sync::session::Identity;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_budget_ceiling() {
        let mut budget = ResolutionBudget::new(2);
        assert_eq!(budget.enter().unwrap(), 1);
        assert_eq!(budget.enter().unwrap(), 2);
        assert!(matches!(budget.enter(), Err(Error::RetryBoundExceeded(2))));
        assert_eq!(budget.entered(), 2);
    }

    #[test]
    fn test_attempt_sequence_is_bounded() {
        assert_eq!(Attempt::SEQUENCE.len(), 2);
        assert_eq!(Attempt::SEQUENCE[0], Attempt::Continue);
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line(Some("abc\ndef".to_string())).as_deref(), Some("abc"));
        assert_eq!(first_line(None), None);
    }

    /// Simulates a repository whose markers change in response to git commands
    struct FakeRepo {
        git_dir: std::path::PathBuf,
        conflicts: Mutex<Vec<String>>,
        /// Whether aborting then re-merging reproduces the conflict
        conflict_recurs: bool,
        commands: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GitRunner for FakeRepo {
        async fn run(&self, args: &[&str], _workdir: &Path) -> Result<GitOutput> {
            let line = args.join(" ");
            self.commands.lock().unwrap().push(line.clone());
            let merge_head = self.git_dir.join("MERGE_HEAD");

            if line.ends_with("merge --continue") {
                let _ = fs::remove_file(&merge_head);
            } else if line == "merge --abort" {
                let _ = fs::remove_file(&merge_head);
                self.conflicts.lock().unwrap().clear();
            } else if line.contains("merge --no-edit") && self.conflict_recurs {
                fs::write(&merge_head, "feedface\n")?;
                *self.conflicts.lock().unwrap() = vec!["shared.txt".to_string()];
                return Ok(GitOutput::failed(1, "CONFLICT (content): Merge conflict in shared.txt"));
            } else if line == "diff --name-only --diff-filter=U" {
                return Ok(GitOutput::ok(self.conflicts.lock().unwrap().join("\n")));
            }
            Ok(GitOutput::ok(""))
        }
    }

    fn setup(conflicts: Vec<&str>, conflict_recurs: bool) -> (TempDir, FakeRepo, RepositorySession) {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        let git_dir = dir.path().join(".git");
        fs::write(git_dir.join("MERGE_HEAD"), "feedface\n").unwrap();

        let runner = FakeRepo {
            git_dir,
            conflicts: Mutex::new(conflicts.into_iter().map(String::from).collect()),
            conflict_recurs,
            commands: Mutex::new(Vec::new()),
        };
        let session = RepositorySession {
            workdir: dir.path().to_path_buf(),
            branch: "main".to_string(),
            remote_name: "origin".to_string(),
            remote_url: "/srv/git/repo.git".to_string(),
            identity: Identity::new("Bot", "bot@example.com"),
        };
        (dir, runner, session)
    }

    #[tokio::test]
    async fn test_merge_without_conflicts_continues() {
        let (_dir, runner, session) = setup(vec![], false);
        let resolver = ConflictResolver::new(&runner, &session, &NullSink);
        let condition = inspect(&runner, &session.workdir).await.unwrap();
        assert_eq!(condition.primary(), Some(InterruptedOperation::Merging));

        let mut budget = ResolutionBudget::default();
        let resolution = resolver.resolve(condition, &mut budget).await.unwrap();

        assert!(resolution.is_resolved());
        let commands = runner.commands.lock().unwrap();
        assert!(commands.iter().any(|c| c == "config user.name Bot"));
        assert!(commands.iter().any(|c| c.ends_with("merge --continue")));
        assert!(!commands.iter().any(|c| c == "merge --abort"));
    }

    #[tokio::test]
    async fn test_conflicted_merge_is_reapplied() {
        let (_dir, runner, session) = setup(vec!["shared.txt"], false);
        let resolver = ConflictResolver::new(&runner, &session, &NullSink);
        let condition = inspect(&runner, &session.workdir).await.unwrap();

        let mut budget = ResolutionBudget::default();
        let resolution = resolver.resolve(condition, &mut budget).await.unwrap();

        assert!(resolution.is_resolved());
        let commands = runner.commands.lock().unwrap();
        assert!(!commands.iter().any(|c| c.ends_with("merge --continue")));
        assert!(commands.iter().any(|c| c == "merge --abort"));
        assert!(commands.iter().any(|c| c.ends_with("merge --no-edit feedface")));
    }

    #[tokio::test]
    async fn test_recurring_conflict_needs_manual_resolution() {
        let (_dir, runner, session) = setup(vec!["shared.txt"], true);
        let resolver = ConflictResolver::new(&runner, &session, &NullSink);
        let condition = inspect(&runner, &session.workdir).await.unwrap();

        let mut budget = ResolutionBudget::default();
        let resolution = resolver.resolve(condition, &mut budget).await.unwrap();

        match resolution.clone() {
            Resolution::NeedsManualResolution { conflicts, .. } => {
                assert_eq!(conflicts, vec!["shared.txt"]);
            }
            other => panic!("expected manual resolution, got {:?}", other),
        }
        let err = resolution.into_result().unwrap_err();
        assert!(matches!(err, Error::UnresolvableConflict { .. }));
        assert!(err.to_string().contains("merge"));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_across_calls() {
        let (_dir, runner, session) = setup(vec!["shared.txt"], true);
        let resolver = ConflictResolver::new(&runner, &session, &NullSink);
        let mut budget = ResolutionBudget::new(1);

        let condition = inspect(&runner, &session.workdir).await.unwrap();
        resolver.resolve(condition.clone(), &mut budget).await.unwrap();

        let err = resolver.resolve(condition, &mut budget).await.unwrap_err();
        assert!(matches!(err, Error::RetryBoundExceeded(1)));
    }

    /// Repository where `--abort` and `--continue` clear git's markers and
    /// re-applying succeeds
    struct MarkerRepo {
        git_dir: std::path::PathBuf,
        conflicts: Vec<String>,
        commands: Mutex<Vec<String>>,
    }

    impl MarkerRepo {
        fn clear(&self, markers: &[&str]) {
            for marker in markers {
                let path = self.git_dir.join(marker);
                let _ = fs::remove_dir_all(&path);
                let _ = fs::remove_file(&path);
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GitRunner for MarkerRepo {
        async fn run(&self, args: &[&str], _workdir: &Path) -> Result<GitOutput> {
            let line = args.join(" ");
            self.commands.lock().unwrap().push(line.clone());

            if line == "diff --name-only --diff-filter=U" {
                return Ok(GitOutput::ok(self.conflicts.join("\n")));
            }
            if line.ends_with("--continue") || line.ends_with("--abort") {
                self.clear(&["rebase-merge", "rebase-apply", "MERGE_HEAD", "CHERRY_PICK_HEAD"]);
            } else if line == "bisect reset" {
                self.clear(&["BISECT_LOG", "BISECT_START"]);
            }
            Ok(GitOutput::ok(""))
        }
    }

    /// Repository with the given marker files written under `.git`
    fn marked(markers: &[(&str, &str)], conflicts: Vec<&str>) -> (TempDir, MarkerRepo, RepositorySession) {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        let git_dir = dir.path().join(".git");
        for (name, content) in markers {
            let path = git_dir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        let runner = MarkerRepo {
            git_dir,
            conflicts: conflicts.into_iter().map(String::from).collect(),
            commands: Mutex::new(Vec::new()),
        };
        let session = RepositorySession {
            workdir: dir.path().to_path_buf(),
            branch: "main".to_string(),
            remote_name: "origin".to_string(),
            remote_url: "/srv/git/repo.git".to_string(),
            identity: Identity::new("Bot", "bot@example.com"),
        };
        (dir, runner, session)
    }

    async fn run_resolver(runner: &MarkerRepo, session: &RepositorySession) -> Resolution {
        let condition = inspect(runner, &session.workdir).await.unwrap();
        let mut budget = ResolutionBudget::default();
        ConflictResolver::new(runner, session, &NullSink)
            .resolve(condition, &mut budget)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_conflicted_rebase_is_reapplied_onto_recorded_base() {
        let (_dir, runner, session) = marked(
            &[
                ("rebase-merge/interactive", ""),
                ("rebase-merge/onto", "0a1b2c3d\n"),
                ("rebase-merge/head-name", "refs/heads/main\n"),
            ],
            vec!["notes.md"],
        );

        let resolution = run_resolver(&runner, &session).await;

        assert!(resolution.is_resolved());
        let commands = runner.commands();
        assert!(!commands.iter().any(|c| c.ends_with("rebase --continue")));
        let abort = commands.iter().position(|c| c == "rebase --abort").unwrap();
        let reapply = commands
            .iter()
            .position(|c| c == "-c user.name=Bot -c user.email=bot@example.com rebase 0a1b2c3d")
            .unwrap();
        assert!(abort < reapply);
        assert!(!commands.iter().any(|c| c == "am --abort"));
    }

    #[tokio::test]
    async fn test_apply_backend_rebase_reads_its_own_base() {
        let (_dir, runner, session) = marked(&[("rebase-apply/onto", "feedbeef\n")], vec!["a.txt"]);

        let condition = inspect(&runner, &session.workdir).await.unwrap();
        assert_eq!(condition.primary(), Some(InterruptedOperation::AmRebase));
        let resolution = run_resolver(&runner, &session).await;

        assert!(resolution.is_resolved());
        let commands = runner.commands();
        assert!(commands.iter().any(|c| c == "rebase --abort"));
        assert!(commands.iter().any(|c| c.ends_with("rebase feedbeef")));
    }

    #[tokio::test]
    async fn test_mailbox_apply_continues_with_am() {
        let (_dir, runner, session) = marked(&[("rebase-apply/applying", "")], vec![]);

        let resolution = run_resolver(&runner, &session).await;

        assert!(resolution.is_resolved());
        let commands = runner.commands();
        assert!(commands
            .iter()
            .any(|c| c.ends_with("-c core.editor=true am --continue")));
        assert!(!commands.iter().any(|c| c.contains("rebase")));
    }

    #[tokio::test]
    async fn test_conflicted_mailbox_apply_aborts_with_am() {
        let (_dir, runner, session) = marked(&[("rebase-apply/applying", "")], vec!["patch.txt"]);

        let resolution = run_resolver(&runner, &session).await;

        assert!(resolution.is_resolved());
        let commands = runner.commands();
        assert!(commands.iter().any(|c| c == "am --abort"));
        assert!(!commands.iter().any(|c| c.contains("rebase")));
    }

    #[tokio::test]
    async fn test_conflicted_cherry_pick_is_picked_again() {
        let (_dir, runner, session) =
            marked(&[("CHERRY_PICK_HEAD", "c0ffee42\n")], vec!["shared.txt"]);

        let resolution = run_resolver(&runner, &session).await;

        assert!(resolution.is_resolved());
        let commands = runner.commands();
        assert!(!commands.iter().any(|c| c.ends_with("cherry-pick --continue")));
        assert!(commands.iter().any(|c| c == "cherry-pick --abort"));
        assert!(commands
            .iter()
            .any(|c| c == "-c user.name=Bot -c user.email=bot@example.com cherry-pick c0ffee42"));
    }

    #[tokio::test]
    async fn test_bisect_is_reset() {
        let (_dir, runner, session) =
            marked(&[("BISECT_LOG", "git bisect start\n"), ("BISECT_START", "main\n")], vec![]);

        let resolution = run_resolver(&runner, &session).await;

        assert!(resolution.is_resolved());
        let commands = runner.commands();
        assert_eq!(
            commands.iter().filter(|c| *c == "bisect reset").count(),
            1
        );
        assert!(!commands.iter().any(|c| c.contains("--continue")));
    }
}
