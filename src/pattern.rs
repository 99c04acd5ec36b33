//! Include/exclude path patterns for selecting archive entries.

use std::path::Path;

use crate::zip::{EntryFilter, EntryMetadata};

/// Paths to include (empty = everything) and to exclude
#[derive(Debug, Clone, Default)]
pub struct PathSelector {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl PathSelector {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Check a path against the include and exclude lists.
    ///
    /// Include patterns with wildcards are globbed; plain include patterns
    /// match the full path, its basename, or a directory prefix. Excludes
    /// match by substring or glob.
    pub fn matches(&self, path: &str) -> bool {
        if !self.include.is_empty() {
            let included = self.include.iter().any(|f| {
                if has_glob_chars(f) {
                    glob_match(f, path)
                } else {
                    let basename = Path::new(path)
                        .file_name()
                        .map(|s| s.to_string_lossy())
                        .unwrap_or_default();
                    path == f.as_str()
                        || basename == f.as_str()
                        || (f.ends_with('/') && path.starts_with(f.as_str()))
                }
            });
            if !included {
                return false;
            }
        }

        !self
            .exclude
            .iter()
            .any(|x| path.contains(x.as_str()) || glob_match(x, path))
    }

    /// Turn the selector into an entry filter.
    ///
    /// An empty selector becomes [`EntryFilter::All`] so the reader may use a
    /// single linear pass.
    pub fn into_filter(self) -> EntryFilter {
        if self.include.is_empty() && self.exclude.is_empty() {
            return EntryFilter::All;
        }
        EntryFilter::matching(move |entry: &dyn EntryMetadata| self.matches(entry.path()))
    }
}

/// Whether `pattern` uses `*` or `?`.
pub fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Match `text` against a glob where `*` spans any run of characters
/// (slashes included) and `?` exactly one.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Iterative matcher with single-star backtracking
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
