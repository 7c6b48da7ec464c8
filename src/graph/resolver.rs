// src/graph/resolver.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::errors::{ParlessError, Result};
use crate::fs::FileSystem;
use crate::graph::normalize_path;

/// Default extension appended to specifiers written without one.
pub const DEFAULT_EXTENSION: &str = "less";

/// Resolves raw import specifiers to absolute paths.
///
/// Lookup order for a relative specifier:
/// 1. the importing file's own directory
/// 2. each extra search path, in configured order
/// 3. the working directory
///
/// The first candidate that exists as a file wins. Successful lookups are
/// cached for the lifetime of the resolver (one run), keyed by the importing
/// directory and the specifier, so repeated lookups never touch the
/// filesystem again. Misses are not cached.
#[derive(Debug)]
pub struct ImportResolver {
    fs: Arc<dyn FileSystem>,
    search_paths: Vec<PathBuf>,
    cwd: PathBuf,
    cache: HashMap<(PathBuf, String), PathBuf>,
}

impl ImportResolver {
    pub fn new(fs: Arc<dyn FileSystem>, search_paths: Vec<PathBuf>, cwd: PathBuf) -> Self {
        Self {
            fs,
            search_paths,
            cwd,
            cache: HashMap::new(),
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Number of cached resolutions.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn resolve(&mut self, spec: &str, importing_file: &Path) -> Result<PathBuf> {
        let base = importing_file.parent().unwrap_or(Path::new("/")).to_path_buf();
        let key = (base, spec.to_string());

        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        for candidate in self.candidates(spec, &key.0) {
            trace!(spec, candidate = ?candidate, "probing import candidate");
            if self.fs.is_file(&candidate) {
                self.cache.insert(key, candidate.clone());
                return Ok(candidate);
            }
        }

        Err(ParlessError::NotFound {
            spec: spec.to_string(),
            from: importing_file.to_path_buf(),
        })
    }

    /// Candidate paths in lookup order.
    fn candidates(&self, spec: &str, importing_dir: &Path) -> Vec<PathBuf> {
        let spec_path = with_default_extension(spec);

        if spec_path.is_absolute() {
            return vec![normalize_path(&spec_path)];
        }

        std::iter::once(importing_dir)
            .chain(self.search_paths.iter().map(PathBuf::as_path))
            .chain(std::iter::once(self.cwd.as_path()))
            .map(|dir| normalize_path(&dir.join(&spec_path)))
            .collect()
    }
}

fn with_default_extension(spec: &str) -> PathBuf {
    let path = PathBuf::from(spec);
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(DEFAULT_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn resolver(fs: &MockFileSystem) -> ImportResolver {
        ImportResolver::new(
            Arc::new(fs.clone()),
            vec![PathBuf::from("/lib/a"), PathBuf::from("/lib/b")],
            PathBuf::from("/work"),
        )
    }

    #[test]
    fn importing_directory_wins() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/colors.less", "");
        fs.add_file("/lib/a/colors.less", "");

        let mut r = resolver(&fs);
        let got = r.resolve("colors", Path::new("/proj/main.less")).unwrap();
        assert_eq!(got, PathBuf::from("/proj/colors.less"));
    }

    #[test]
    fn search_paths_then_cwd_in_order() {
        let fs = MockFileSystem::new();
        fs.add_file("/lib/b/grid.less", "");
        fs.add_file("/work/grid.less", "");
        fs.add_file("/work/only-cwd.less", "");

        let mut r = resolver(&fs);
        assert_eq!(
            r.resolve("grid.less", Path::new("/proj/main.less")).unwrap(),
            PathBuf::from("/lib/b/grid.less")
        );
        assert_eq!(
            r.resolve("only-cwd", Path::new("/proj/main.less")).unwrap(),
            PathBuf::from("/work/only-cwd.less")
        );
    }

    #[test]
    fn parent_directory_specifiers_are_normalised() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/shared/vars.less", "");

        let mut r = resolver(&fs);
        let got = r
            .resolve("../shared/vars", Path::new("/proj/pages/home.less"))
            .unwrap();
        assert_eq!(got, PathBuf::from("/proj/shared/vars.less"));
    }

    #[test]
    fn missing_import_is_not_found() {
        let fs = MockFileSystem::new();
        let mut r = resolver(&fs);
        let err = r.resolve("nope", Path::new("/proj/main.less")).unwrap_err();
        assert!(matches!(err, ParlessError::NotFound { ref spec, .. } if spec == "nope"));
        assert_eq!(r.cached(), 0);
    }

    #[test]
    fn repeated_resolution_is_served_from_cache() {
        let fs = MockFileSystem::new();
        fs.add_file("/lib/a/mixins.less", "");

        let mut r = resolver(&fs);
        let first = r.resolve("mixins", Path::new("/proj/main.less")).unwrap();
        let accesses = fs.access_count();

        let second = r.resolve("mixins", Path::new("/proj/main.less")).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs.access_count(), accesses, "cache hit must not touch the filesystem");
    }
}
