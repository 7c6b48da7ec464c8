// src/graph/scan.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{ParlessError, Result};
use crate::fs::FileSystem;

/// Compiled match / exclude patterns for candidate source files.
///
/// Patterns are evaluated against paths relative to the scanned directory,
/// with forward slashes (e.g. `"pages/home.less"`).
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    matches: GlobSet,
    exclude: Option<GlobSet>,
}

impl SourceMatcher {
    pub fn new(match_pattern: &str, exclude: &[String]) -> Result<Self> {
        let matches = build_globset(&[match_pattern.to_string()])
            .with_context(|| format!("building match globset from {match_pattern:?}"))?;
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self { matches, exclude })
    }

    pub fn is_match(&self, rel_path: &str) -> bool {
        if !self.matches.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect every file under `root` accepted by `matcher`.
///
/// The result is sorted so that discovery order (and therefore job dispatch
/// order) is deterministic across runs and platforms. Each directory is
/// walked once by canonical path, so symlinked directories that loop back
/// into the tree do not repeat files.
pub fn scan(fs: &dyn FileSystem, root: &Path, matcher: &SourceMatcher) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let canonical = fs.canonicalize(&dir).unwrap_or_else(|_| dir.clone());
        if !visited.insert(canonical) {
            continue;
        }

        let entries = fs
            .read_dir(&dir)
            .map_err(|e| ParlessError::read_failed(&dir, e))?;
        for path in entries {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if matcher.is_match(&rel_str) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn scan_applies_match_and_exclude() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/main.less", "");
        fs.add_file("/proj/pages/home.less", "");
        fs.add_file("/proj/pages/_partial.less", "");
        fs.add_file("/proj/readme.md", "");

        let matcher = SourceMatcher::new("**/*.less", &["**/_*".to_string()]).unwrap();
        let files = scan(&fs, Path::new("/proj"), &matcher).unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("/proj/main.less"),
                PathBuf::from("/proj/pages/home.less"),
            ]
        );
    }

    #[test]
    fn unreadable_directory_is_a_read_error() {
        let fs = MockFileSystem::new();
        let matcher = SourceMatcher::new("**/*.less", &[]).unwrap();
        let err = scan(&fs, Path::new("/missing"), &matcher).unwrap_err();
        assert!(matches!(err, ParlessError::ReadFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_loop_is_walked_once() {
        use crate::fs::RealFileSystem;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("sub/a.less"), ".a {}").unwrap();
        std::os::unix::fs::symlink(root, root.join("sub/loop")).unwrap();

        let matcher = SourceMatcher::new("**/*.less", &[]).unwrap();
        let files = scan(&RealFileSystem, root, &matcher).unwrap();

        assert_eq!(files, vec![root.join("sub/a.less")]);
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(SourceMatcher::new("a/[", &[]).is_err());
    }
}
