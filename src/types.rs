// src/types.rs

use std::path::{Path, PathBuf};

use serde::Serialize;

/// One compile job: a source target and where its output goes.
///
/// Queued once and handed to exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Job {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl Job {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }

    /// Map `source` under `directory` to the same relative path under
    /// `outputdir` with a `.css` extension. Sources outside `directory` keep
    /// only their file name.
    pub fn for_target(source: &Path, directory: &Path, outputdir: &Path) -> Self {
        let relative = source
            .strip_prefix(directory)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| source.file_name().map(PathBuf::from).unwrap_or_default());
        let dest = outputdir.join(relative).with_extension("css");
        Self::new(source, dest)
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Targets compiled.
    pub targets: usize,
    /// Files preloaded into every worker's cache.
    pub files_read: usize,
    /// Workers that reached the ready quorum.
    pub workers: usize,
    /// Replacement workers spawned after crashes.
    pub replacements: usize,
    /// Jobs drained per worker, by worker id.
    pub jobs_per_worker: Vec<(usize, usize)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dest_mirrors_source_tree() {
        let job = Job::for_target(
            Path::new("/src/pages/home.less"),
            Path::new("/src"),
            Path::new("/out"),
        );
        assert_eq!(job.dest, PathBuf::from("/out/pages/home.css"));
    }

    #[test]
    fn dest_for_source_outside_directory() {
        let job = Job::for_target(
            Path::new("/lib/shared.less"),
            Path::new("/src"),
            Path::new("/out"),
        );
        assert_eq!(job.dest, PathBuf::from("/out/shared.css"));
    }
}
