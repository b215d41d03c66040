//! Source file discovery for the build system.
//!
//! Walks a base directory and keeps the files whose relative path matches
//! the glob patterns from the configuration. Patterns support `**` and
//! `{a,b}` alternation; `*` never crosses a `/`.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, globset::Error),
    /// IO error during file enumeration
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// Compiled set of patterns, matched against paths relative to a base.
#[derive(Debug, Clone)]
pub struct PatternSet {
    globs: GlobSet,
    dot: bool,
}

impl PatternSet {
    /// Compile patterns into a single set.
    ///
    /// With `dot` unset, paths with any hidden component never match.
    pub fn new<S: AsRef<str>>(patterns: &[S], dot: bool) -> Result<Self, DiscoveryError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))?;
            builder.add(glob);
        }
        let globs = builder
            .build()
            .map_err(|e| DiscoveryError::InvalidPattern(join_patterns(patterns), e))?;
        Ok(Self { globs, dot })
    }

    /// Check a path relative to the pattern base.
    pub fn matches(&self, relative: &Path) -> bool {
        (self.dot || !is_hidden(relative)) && self.globs.is_match(relative)
    }
}

fn join_patterns<S: AsRef<str>>(patterns: &[S]) -> String {
    let names: Vec<&str> = patterns.iter().map(|p| p.as_ref()).collect();
    names.join(", ")
}

/// Whether any component of a relative path starts with `.`.
fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Discover files matching a glob pattern.
///
/// # Arguments
/// - `base_dir` - Base directory to resolve patterns from
/// - `pattern` - Glob pattern to match, relative to `base_dir`
/// - `dot` - Whether wildcards also match dot files and dot directories
///
/// # Returns
/// Sorted list of matching file paths. A missing base directory yields an
/// empty list.
pub fn discover_files(
    base_dir: &Path,
    pattern: &str,
    dot: bool,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let set = PatternSet::new(&[pattern], dot)?;
    if !base_dir.is_dir() {
        return Ok(vec![]);
    }

    let walker = WalkDir::new(base_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            dot || entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("error reading path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(base_dir) else {
            continue;
        };
        if set.matches(relative) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(base: &Path, rel: &str) -> PathBuf {
        let path = base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, rel).unwrap();
        path
    }

    #[test]
    fn test_discover_files_recursive() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "index.html");
        touch(temp.path(), "docs/about.html");
        touch(temp.path(), "assets/styles/main.scss");

        let files = discover_files(temp.path(), "**/*.html", false).unwrap();
        assert_eq!(
            files,
            vec![temp.path().join("docs/about.html"), temp.path().join("index.html")]
        );
    }

    #[test]
    fn test_discover_files_with_braces() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "assets/images/logo.png");
        touch(temp.path(), "assets/images/icons/a.svg");
        touch(temp.path(), "assets/images/notes.txt");

        let files =
            discover_files(temp.path(), "assets/images/**/*.{png,jpg,jpeg,svg,gif}", false)
                .unwrap();
        assert_eq!(
            files,
            vec![
                temp.path().join("assets/images/icons/a.svg"),
                temp.path().join("assets/images/logo.png"),
            ]
        );
    }

    #[test]
    fn test_double_star_matches_files_at_any_depth() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "top.txt");
        touch(temp.path(), "a/b/c.txt");
        touch(temp.path(), ".well-known/security.txt");

        let files = discover_files(temp.path(), "**", false).unwrap();
        assert_eq!(files, vec![temp.path().join("a/b/c.txt"), temp.path().join("top.txt")]);

        let files = discover_files(temp.path(), "**", true).unwrap();
        assert_eq!(
            files,
            vec![
                temp.path().join(".well-known/security.txt"),
                temp.path().join("a/b/c.txt"),
                temp.path().join("top.txt"),
            ]
        );
    }

    #[test]
    fn test_single_star_stays_in_one_directory() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "assets/scripts/main.js");
        touch(temp.path(), "assets/scripts/vendor/lib.js");

        let files = discover_files(temp.path(), "assets/scripts/*.js", false).unwrap();
        assert_eq!(files, vec![temp.path().join("assets/scripts/main.js")]);
    }

    #[test]
    fn test_discover_files_dot_option() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), ".htaccess");
        touch(temp.path(), "favicon.ico");

        assert_eq!(discover_files(temp.path(), "**/*", false).unwrap().len(), 1);
        assert_eq!(discover_files(temp.path(), "**/*", true).unwrap().len(), 2);
    }

    #[test]
    fn test_discover_files_missing_base() {
        let files = discover_files(Path::new("/nonexistent/base"), "**/*", true).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_pattern_set_matches() {
        let set = PatternSet::new(&["assets/styles/**/*.scss"], false).unwrap();
        assert!(set.matches(Path::new("assets/styles/main.scss")));
        assert!(set.matches(Path::new("assets/styles/partials/_vars.scss")));
        assert!(!set.matches(Path::new("assets/scripts/main.js")));

        let set = PatternSet::new(&["assets/images/**/*.{png,svg}", "assets/fonts/**/*"], false)
            .unwrap();
        assert!(set.matches(Path::new("assets/images/logo.svg")));
        assert!(set.matches(Path::new("assets/fonts/icons.woff")));
        assert!(!set.matches(Path::new("assets/images/logo.gif")));
    }

    #[test]
    fn test_pattern_set_hidden_paths() {
        let hidden = Path::new(".well-known/security.txt");
        assert!(!PatternSet::new(&["**"], false).unwrap().matches(hidden));
        assert!(PatternSet::new(&["**"], true).unwrap().matches(hidden));
    }

    #[test]
    fn test_pattern_set_invalid() {
        let result = PatternSet::new(&["a/[unclosed"], false);
        assert!(matches!(result, Err(DiscoveryError::InvalidPattern(..))));
    }
}
