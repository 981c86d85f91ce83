use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Invalid resolver pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Discovery task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Translate a glob into an anchored regex over `/`-separated relative paths.
///
/// Supports `*`, `**`, `?`, `[...]` classes and `{a,b}` alternation.
fn glob_to_regex(pattern: &str) -> Result<Regex, DiscoveryError> {
    let mut out = String::from("^");
    let mut chars = pattern.trim_start_matches("./").chars().peekable();
    let mut braces = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:[^/]*/)*");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        out.push(']');
                        break;
                    }
                    if c == '\\' || c == '[' {
                        out.push('\\');
                    }
                    out.push(c);
                }
            }
            '{' => {
                braces += 1;
                out.push_str("(?:");
            }
            '}' if braces > 0 => {
                braces -= 1;
                out.push(')');
            }
            ',' if braces > 0 => out.push('|'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');

    Regex::new(&out).map_err(|source| DiscoveryError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Leading directories of `pattern` that contain no glob syntax.
fn literal_prefix(pattern: &str) -> PathBuf {
    let pattern = pattern.trim_start_matches("./");
    let mut segments: Vec<&str> = pattern.split('/').collect();
    segments.pop();
    segments
        .into_iter()
        .take_while(|segment| !segment.contains(['*', '?', '[', '{']))
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Find files under `app_root` matching a glob `pattern`.
///
/// The pattern is relative to `app_root` and `*` does not cross directory
/// boundaries. Only the pattern's literal directory prefix is scanned.
/// Entries that cannot be read (dangling links, permission errors, loops)
/// are logged and skipped. Results are absolute and sorted.
pub async fn discover(app_root: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let matcher = glob_to_regex(pattern)?;

    let root = app_root.to_path_buf();
    let base = root.join(literal_prefix(pattern));
    tokio::task::spawn_blocking(move || {
        let mut found = Vec::new();
        if !base.is_dir() {
            return Ok(found);
        }
        for entry in WalkDir::new(&base).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "Skipping unreadable entry during resolver discovery"
                    );
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if matcher.is_match(&relative) {
                let path = entry.into_path();
                found.push(std::path::absolute(&path).unwrap_or(path));
            }
        }
        found.sort();
        Ok(found)
    })
    .await?
}
