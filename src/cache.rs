// src/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::debug;

use crate::errors::{ParlessError, Result};
use crate::fs::FileSystem;

/// Default number of concurrent reads while populating a cache.
///
/// Keeps the number of open descriptors bounded on large trees.
pub const DEFAULT_READ_BATCH: usize = 100;

/// In-memory cache of source file contents, keyed by absolute path.
///
/// Populated once per run from the controller's file list, then read-only
/// apart from files discovered while compiling. Those are added on demand;
/// inserting the same path twice is harmless (last writer wins, and the
/// contents are expected to be identical within a run).
#[derive(Debug, Default, Clone)]
pub struct FileCache {
    contents: HashMap<PathBuf, Arc<str>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self {
            contents: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.contents.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<str>> {
        self.contents.get(path).cloned()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, contents: impl Into<Arc<str>>) {
        self.contents.insert(path.into(), contents.into());
    }

    /// Get a file's contents, reading it synchronously on a miss.
    pub fn get_or_load(&mut self, fs: &dyn FileSystem, path: &Path) -> Result<Arc<str>> {
        if let Some(hit) = self.contents.get(path) {
            return Ok(hit.clone());
        }

        debug!("cache miss: reading {:?}", path);
        let text: Arc<str> = fs
            .read_to_string(path)
            .map_err(|e| ParlessError::read_failed(path, e))?
            .into();
        self.contents.insert(path.to_path_buf(), text.clone());
        Ok(text)
    }

    /// Read every path into the cache, at most `width` reads in flight.
    ///
    /// Stops at the first failing read; files read before the failure stay
    /// cached but the caller must treat the cache as incomplete.
    pub async fn populate(
        &mut self,
        fs: Arc<dyn FileSystem>,
        paths: &[PathBuf],
        width: usize,
    ) -> Result<()> {
        for batch in paths.chunks(width.max(1)) {
            let mut reads = JoinSet::new();
            for path in batch {
                let fs = Arc::clone(&fs);
                let path = path.clone();
                reads.spawn_blocking(move || {
                    let result = fs.read_to_string(&path);
                    (path, result)
                });
            }

            while let Some(joined) = reads.join_next().await {
                let (path, result) = joined.map_err(anyhow::Error::from)?;
                let text = result.map_err(|e| ParlessError::read_failed(&path, e))?;
                self.contents.insert(path, text.into());
            }
        }

        debug!(files = self.contents.len(), "file cache populated");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.contents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[tokio::test]
    async fn populate_reads_in_batches() {
        let fs = MockFileSystem::new();
        let paths: Vec<PathBuf> = (0..7)
            .map(|i| {
                let p = PathBuf::from(format!("/p/f{i}.less"));
                fs.add_file(&p, format!(".f{i}{{}}"));
                p
            })
            .collect();

        let mut cache = FileCache::new();
        cache.populate(Arc::new(fs.clone()), &paths, 3).await.unwrap();

        assert_eq!(cache.len(), 7);
        assert_eq!(&*cache.get(Path::new("/p/f4.less")).unwrap(), ".f4{}");
    }

    #[tokio::test]
    async fn populate_fails_on_unreadable_file() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/ok.less", "");
        let paths = vec![PathBuf::from("/p/ok.less"), PathBuf::from("/p/missing.less")];

        let mut cache = FileCache::new();
        let err = cache
            .populate(Arc::new(fs), &paths, DEFAULT_READ_BATCH)
            .await
            .unwrap_err();
        assert!(matches!(err, ParlessError::ReadFailed { ref path, .. } if path.ends_with("missing.less")));
    }

    #[test]
    fn get_or_load_caches_misses() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/late.less", ".late{}");

        let mut cache = FileCache::new();
        cache.get_or_load(&fs, Path::new("/p/late.less")).unwrap();
        let accesses = fs.access_count();
        cache.get_or_load(&fs, Path::new("/p/late.less")).unwrap();
        assert_eq!(fs.access_count(), accesses);
    }
}
