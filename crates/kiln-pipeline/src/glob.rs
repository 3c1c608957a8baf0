//! Ordered glob pattern lists with `!` negation.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

use crate::task::TaskError;

/// Errors raised while compiling a pattern list.
#[derive(Debug, thiserror::Error)]
#[error("Invalid pattern '{pattern}': {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

#[derive(Debug, Clone)]
struct Rule {
    negated: bool,
    matcher: GlobMatcher,
}

/// An ordered list of include (`pattern`) and exclude (`!pattern`) globs.
///
/// Rules are applied in order, so a later include can re-admit a path an
/// earlier exclude removed. Paths are matched relative to a base directory
/// using `/` separators; `*` stays within one directory, `**` spans several.
#[derive(Debug, Clone)]
pub struct PatternList {
    rules: Vec<Rule>,
}

impl PatternList {
    /// Compile a list of patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let mut rules = Vec::with_capacity(patterns.len());

        for raw in patterns {
            let raw = raw.as_ref().trim();
            let (negated, pattern) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, raw),
            };

            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| PatternError {
                    pattern: raw.to_string(),
                    message: e.to_string(),
                })?;

            rules.push(Rule {
                negated,
                matcher: glob.compile_matcher(),
            });
        }

        Ok(Self { rules })
    }

    /// Whether the list selects `rel_path`.
    pub fn is_match(&self, rel_path: impl AsRef<Path>) -> bool {
        self.selecting_rule(&normalize(rel_path.as_ref())).is_some()
    }

    /// Index of the first include rule that matched, if the path survives
    /// every later exclude.
    fn selecting_rule(&self, rel: &str) -> Option<usize> {
        let mut first_include = None;
        let mut included = false;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matcher.is_match(rel) {
                continue;
            }
            if rule.negated {
                included = false;
            } else {
                included = true;
                first_include.get_or_insert(index);
            }
        }

        if included {
            first_include
        } else {
            None
        }
    }

    /// Walk `base` and return every selected file as a base-relative path.
    ///
    /// Files come back grouped by the first include pattern that selected
    /// them, sorted by path within a group. A missing base yields nothing;
    /// any other walk error is fatal.
    pub fn expand(&self, base: &Path) -> Result<Vec<PathBuf>, TaskError> {
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut selected: Vec<(usize, String, PathBuf)> = Vec::new();
        for entry in WalkDir::new(base).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(base).to_path_buf();
                TaskError::read(&path, e)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(base) else {
                continue;
            };
            let key = normalize(relative);
            if let Some(rule) = self.selecting_rule(&key) {
                selected.push((rule, key, relative.to_path_buf()));
            }
        }

        selected.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(selected.into_iter().map(|(_, _, path)| path).collect())
    }
}

/// Render a relative path with `/` separators.
pub fn normalize(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
