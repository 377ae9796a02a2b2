//! Parsing of `git status --porcelain` listings
//!
//! Git quotes paths containing non-ASCII bytes and escapes each such byte as a
//! backslash followed by three octal digits (`caf\303\251.txt`). Decoding has
//! to gather the raw bytes first and only then interpret them as UTF-8, since
//! a single character usually spans several escapes.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lines that represent uncommitted work: untracked, added, copied, modified,
/// renamed, deleted or unmerged entries in either column.
static UNCOMMITTED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\?\?|[ACMRDTU][ ACMRDTU]|[ ][ACMRDTU]) ").expect("static regex is valid")
});

/// Kind of change reported for a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Not tracked by git
    Untracked,
    /// Newly added to the index
    Added,
    /// Content modified
    Modified,
    /// Removed
    Deleted,
    /// Moved, with the original path recorded
    Renamed,
    /// Copied from another path
    Copied,
    /// File type changed (e.g. file to symlink)
    TypeChanged,
    /// Unresolved merge conflict
    Unmerged,
    /// Ignored by .gitignore (only with --ignored)
    Ignored,
}

impl ChangeKind {
    fn from_columns(index: char, worktree: char) -> Self {
        match (index, worktree) {
            ('?', '?') => Self::Untracked,
            ('!', '!') => Self::Ignored,
            ('U', _) | (_, 'U') | ('A', 'A') | ('D', 'D') => Self::Unmerged,
            ('R', _) | (_, 'R') => Self::Renamed,
            ('C', _) | (_, 'C') => Self::Copied,
            ('A', _) => Self::Added,
            ('D', _) | (_, 'D') => Self::Deleted,
            ('T', _) | (_, 'T') => Self::TypeChanged,
            _ => Self::Modified,
        }
    }
}

/// One entry of a status listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    /// Index (staged) status column
    pub index: char,
    /// Working-tree status column
    pub worktree: char,
    /// Classified change
    pub kind: ChangeKind,
    /// Path relative to the repository root, decoded
    pub path: String,
    /// Source path for renames and copies
    pub original_path: Option<String>,
}

/// Whether a porcelain listing contains any uncommitted change
pub fn has_uncommitted_changes(listing: &str) -> bool {
    listing.lines().any(|line| UNCOMMITTED_LINE.is_match(line))
}

/// Parse a `git status --porcelain` (v1 / short format) listing
///
/// Lines that are too short to carry a path are skipped. The result is sorted
/// with [`collate`].
pub fn parse_status(listing: &str) -> Vec<FileChange> {
    let mut changes: Vec<FileChange> = listing.lines().filter_map(parse_line).collect();
    changes.sort_by(|a, b| collate(&a.path, &b.path));
    changes
}

fn parse_line(line: &str) -> Option<FileChange> {
    let mut chars = line.chars();
    let index = chars.next()?;
    let worktree = chars.next()?;
    let rest = line.get(3..)?;
    if rest.is_empty() {
        return None;
    }

    let (original_path, path) = match split_rename(rest) {
        Some((from, to)) => (Some(decode_path(from)), decode_path(to)),
        None => (None, decode_path(rest)),
    };

    Some(FileChange {
        index,
        worktree,
        kind: ChangeKind::from_columns(index, worktree),
        path,
        original_path,
    })
}

/// Split `from -> to`, ignoring arrows inside quoted paths
fn split_rename(rest: &str) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in rest.char_indices() {
        match c {
            '\\' if in_quotes && !escaped => {
                escaped = true;
                continue;
            }
            '"' if !escaped => in_quotes = !in_quotes,
            ' ' if !in_quotes && rest[i..].starts_with(" -> ") => {
                return Some((&rest[..i], &rest[i + 4..]));
            }
            _ => {}
        }
        escaped = false;
    }
    None
}

/// Decode one path field of a status listing
///
/// Quoted fields without an embedded `,` or `;` are unescaped; everything else
/// is returned unchanged.
pub fn decode_path(field: &str) -> String {
    let quoted = field.len() >= 2
        && field.starts_with('"')
        && field.ends_with('"')
        && !field.contains(',')
        && !field.contains(';');

    if quoted {
        unescape_quoted(&field[1..field.len() - 1])
    } else {
        field.to_string()
    }
}

fn unescape_quoted(inner: &str) -> String {
    let bytes = inner.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 >= bytes.len() {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let next = bytes[i + 1];
        if let Some(value) = octal_byte(&bytes[i + 1..]) {
            out.push(value);
            i += 4;
            continue;
        }

        let unescaped = match next {
            b'\\' => Some(b'\\'),
            b'"' => Some(b'"'),
            b't' => Some(b'\t'),
            b'n' => Some(b'\n'),
            b'r' => Some(b'\r'),
            b'a' => Some(0x07),
            b'b' => Some(0x08),
            b'f' => Some(0x0c),
            b'v' => Some(0x0b),
            _ => None,
        };
        match unescaped {
            Some(b) => {
                out.push(b);
                i += 2;
            }
            None => {
                out.push(b'\\');
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Value of a three-digit octal escape at the start of `digits`
fn octal_byte(digits: &[u8]) -> Option<u8> {
    let d = digits.get(..3)?;
    if !d.iter().all(|b| (b'0'..=b'7').contains(b)) {
        return None;
    }
    let value = u32::from(d[0] - b'0') * 64 + u32::from(d[1] - b'0') * 8 + u32::from(d[2] - b'0');
    u8::try_from(value).ok()
}

/// Compare two paths the way a human-facing listing orders them
///
/// Accents and case only break ties: `Éclair` sorts between `apple` and
/// `zebra`, not after every ASCII name.
pub fn collate(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collation_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
