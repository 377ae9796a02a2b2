//! Divergence between local HEAD and the remote-tracking branch

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use super::runner::GitRunner;
use crate::Result;

/// How local HEAD relates to `<remote>/<branch>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DivergenceState {
    /// The remote-tracking ref does not exist (new or empty remote)
    NoUpstreamOrBareUpstream,
    /// Same commit on both sides
    Equal,
    /// Local has commits the remote lacks
    Ahead,
    /// Remote has commits local lacks
    Behind,
    /// Both sides have commits the other lacks
    Diverged,
}

impl DivergenceState {
    /// Map `(remote_only, local_only)` commit counts to a state
    ///
    /// `None` means the comparison produced no output.
    pub fn from_counts(counts: Option<(u64, u64)>) -> Self {
        match counts {
            None => Self::NoUpstreamOrBareUpstream,
            Some((0, 0)) => Self::Equal,
            Some((0, _)) => Self::Ahead,
            Some((_, 0)) => Self::Behind,
            Some(_) => Self::Diverged,
        }
    }

    /// Short name used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoUpstreamOrBareUpstream => "no upstream",
            Self::Equal => "equal",
            Self::Ahead => "ahead",
            Self::Behind => "behind",
            Self::Diverged => "diverged",
        }
    }
}

impl fmt::Display for DivergenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse `git rev-list --left-right --count` output (`<left>\t<right>`)
pub fn parse_left_right(output: &str) -> Option<(u64, u64)> {
    let mut fields = output.split_whitespace();
    let left = fields.next()?.parse().ok()?;
    let right = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((left, right))
}

/// Classify local HEAD against `<remote>/<branch>`
///
/// Reads refs only; callers fetch first when freshness matters. A missing
/// remote-tracking ref makes git fail, which is reported as
/// [`DivergenceState::NoUpstreamOrBareUpstream`].
pub async fn classify(
    runner: &dyn GitRunner,
    path: &Path,
    branch: &str,
    remote: &str,
) -> Result<DivergenceState> {
    let range = format!("{}/{}...HEAD", remote, branch);
    let output = runner
        .run(&["rev-list", "--left-right", "--count", &range], path)
        .await?;

    let counts = if output.success() {
        parse_left_right(&output.stdout)
    } else {
        None
    };
    let state = DivergenceState::from_counts(counts);

    debug!(%range, ?counts, state = %state, "Classified divergence");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::runner::GitOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn test_tie_break_table() {
        assert_eq!(
            DivergenceState::from_counts(None),
            DivergenceState::NoUpstreamOrBareUpstream
        );
        assert_eq!(DivergenceState::from_counts(Some((0, 0))), DivergenceState::Equal);
        assert_eq!(DivergenceState::from_counts(Some((0, 3))), DivergenceState::Ahead);
        assert_eq!(DivergenceState::from_counts(Some((2, 0))), DivergenceState::Behind);
        assert_eq!(DivergenceState::from_counts(Some((1, 1))), DivergenceState::Diverged);
    }

    #[test]
    fn test_parse_left_right() {
        assert_eq!(parse_left_right("3\t0\n"), Some((3, 0)));
        assert_eq!(parse_left_right("0 12"), Some((0, 12)));
        assert_eq!(parse_left_right(""), None);
        assert_eq!(parse_left_right("\n"), None);
        assert_eq!(parse_left_right("1"), None);
        assert_eq!(parse_left_right("a\tb"), None);
        assert_eq!(parse_left_right("1\t2\t3"), None);
    }

    struct Scripted {
        output: GitOutput,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GitRunner for Scripted {
        async fn run(&self, args: &[&str], _workdir: &Path) -> Result<GitOutput> {
            self.seen.lock().unwrap().push(args.join(" "));
            Ok(self.output.clone())
        }
    }

    #[tokio::test]
    async fn test_classify_uses_symmetric_range() {
        let runner = Scripted {
            output: GitOutput::ok("0\t4\n"),
            seen: Mutex::new(Vec::new()),
        };
        let state = classify(&runner, Path::new("."), "main", "origin")
            .await
            .unwrap();

        assert_eq!(state, DivergenceState::Ahead);
        assert_eq!(
            runner.seen.lock().unwrap().as_slice(),
            ["rev-list --left-right --count origin/main...HEAD"]
        );
    }

    #[tokio::test]
    async fn test_classify_unknown_ref_is_no_upstream() {
        let runner = Scripted {
            output: GitOutput::failed(
                128,
                "fatal: ambiguous argument 'origin/main...HEAD': unknown revision",
            ),
            seen: Mutex::new(Vec::new()),
        };
        let state = classify(&runner, Path::new("."), "main", "origin")
            .await
            .unwrap();
        assert_eq!(state, DivergenceState::NoUpstreamOrBareUpstream);
    }
}
