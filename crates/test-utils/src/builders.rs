#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parless::config::{check_arguments, BuildConfig, BuildSection, CompilerSection, RawConfig};
use parless::fs::mock::MockFileSystem;
use tempfile::TempDir;

/// On-disk source tree in a temporary directory.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("creating temp dir"),
        }
    }

    /// Write `contents` at `rel`, creating parent directories.
    pub fn with_file(self, rel: &str, contents: &str) -> Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("creating fixture dir");
        }
        fs::write(&path, contents).expect("writing fixture file");
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Contents of a file under the root, if it exists.
    pub fn read(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.path(rel)).ok()
    }

    /// Config rooted at this fixture: sources in `src/`, output in `out/`.
    pub fn config(&self) -> ConfigBuilder {
        ConfigBuilder::new(self.root())
            .directory("src")
            .outputdir("out")
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `BuildConfig`, going through `check_arguments` like the CLI.
pub struct ConfigBuilder {
    raw: RawConfig,
    cwd: PathBuf,
}

impl ConfigBuilder {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            raw: RawConfig {
                build: BuildSection::default(),
                compiler: CompilerSection::default(),
            },
            cwd: cwd.into(),
        }
    }

    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.build.directory = Some(dir.into());
        self
    }

    pub fn outputdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.build.outputdir = Some(dir.into());
        self
    }

    pub fn match_pattern(mut self, pattern: &str) -> Self {
        self.raw.build.match_pattern = Some(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.raw.build.exclude.push(pattern.to_string());
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.raw.build.workers = Some(n);
        self
    }

    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.build.paths.push(dir.into());
        self
    }

    pub fn changed(mut self, file: impl Into<PathBuf>) -> Self {
        self.raw.build.changed.push(file.into());
        self
    }

    pub fn compress(mut self) -> Self {
        self.raw.compiler.compress = Some(true);
        self
    }

    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.raw.build.ready_timeout = Some(timeout.as_secs().max(1));
        self
    }

    pub fn build(self) -> BuildConfig {
        check_arguments(self.raw, &self.cwd).expect("Failed to build valid config from builder")
    }
}

/// In-memory tree from `(absolute path, contents)` pairs.
pub fn mock_tree(files: &[(&str, &str)]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    for (path, contents) in files {
        fs.add_file(path, *contents);
    }
    fs
}
