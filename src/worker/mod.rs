// src/worker/mod.rs

//! Build workers.
//!
//! A [`Worker`] owns a private [`FileCache`] and import resolver, preloads
//! the file batch it is handed at start-up and then compiles one job at a
//! time. Workers never share state with each other; the controller talks to
//! them only through the line protocol in [`crate::protocol`].
//!
//! - [`state`] holds the worker lifecycle state machine.
//! - [`serve`] runs a worker against a command stream and an event stream.

pub mod serve;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{FileCache, DEFAULT_READ_BATCH};
use crate::compile::{CacheImportHost, CompileContext, Compiler, CompilerOptions};
use crate::errors::{ParlessError, Result};
use crate::fs::FileSystem;
use crate::graph::ImportResolver;
use crate::protocol::WorkerId;

pub use serve::{run_process, serve};
pub use state::WorkerState;

/// Settings a worker is launched with. Identical for every worker of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Extra import search paths, in lookup order.
    pub search_paths: Vec<PathBuf>,
    /// Last-resort import lookup directory.
    pub cwd: PathBuf,
    pub options: CompilerOptions,
    /// Concurrent reads while populating the cache.
    pub read_batch: usize,
}

impl WorkerSettings {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            search_paths: Vec::new(),
            cwd: cwd.into(),
            options: CompilerOptions::default(),
            read_batch: DEFAULT_READ_BATCH,
        }
    }
}

/// What a successful job did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Output written to the destination.
    Written { bytes: usize },
    /// The compiler produced no output; nothing was written.
    Empty,
}

#[derive(Debug)]
pub struct Worker {
    id: WorkerId,
    state: WorkerState,
    fs: Arc<dyn FileSystem>,
    cache: FileCache,
    resolver: ImportResolver,
    compiler: Arc<dyn Compiler>,
    options: CompilerOptions,
    read_batch: usize,
    jobs_done: usize,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        fs: Arc<dyn FileSystem>,
        compiler: Arc<dyn Compiler>,
        settings: WorkerSettings,
    ) -> Self {
        let resolver = ImportResolver::new(Arc::clone(&fs), settings.search_paths, settings.cwd);
        Self {
            id,
            state: WorkerState::Idle,
            fs,
            cache: FileCache::new(),
            resolver,
            compiler,
            options: settings.options,
            read_batch: settings.read_batch,
            jobs_done: 0,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    pub fn jobs_done(&self) -> usize {
        self.jobs_done
    }

    /// Preload `batch` into the cache.
    ///
    /// On a read failure the worker returns to `Idle` with a partial cache
    /// and must not report ready.
    pub async fn initialize(&mut self, batch: &[PathBuf]) -> Result<()> {
        self.transition(WorkerState::Loading)?;
        info!(worker = self.id, files = batch.len(), "loading file batch");

        let result = self
            .cache
            .populate(Arc::clone(&self.fs), batch, self.read_batch)
            .await;

        self.transition(WorkerState::Idle)?;
        if let Err(err) = &result {
            warn!(worker = self.id, error = %err, "file batch failed to load");
        }
        result
    }

    /// Compile `source` and write the result to `dest`.
    ///
    /// Empty output is not written. Either way the worker ends in
    /// `Draining` on success and back in `Idle` on failure.
    pub fn build_one(&mut self, source: &Path, dest: &Path) -> Result<BuildOutcome> {
        self.transition(WorkerState::Building)?;
        debug!(worker = self.id, file = ?source, dest = ?dest, "building");

        match self.compile_and_write(source, dest) {
            Ok(outcome) => {
                self.jobs_done += 1;
                self.transition(WorkerState::Draining)?;
                Ok(outcome)
            }
            Err(err) => {
                self.transition(WorkerState::Idle)?;
                Err(err)
            }
        }
    }

    /// Drop the cache and stop accepting commands. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state == WorkerState::Stopped {
            return;
        }
        info!(worker = self.id, jobs = self.jobs_done, "worker shutting down");
        self.cache.clear();
        self.state = WorkerState::Stopped;
    }

    fn compile_and_write(&mut self, source: &Path, dest: &Path) -> Result<BuildOutcome> {
        let text = self
            .cache
            .get_or_load(self.fs.as_ref(), source)
            .map_err(|_| ParlessError::ReadFailed {
                path: source.to_path_buf(),
                message: "File not found".to_string(),
            })?;

        let mut host = CacheImportHost {
            fs: self.fs.as_ref(),
            cache: &mut self.cache,
            resolver: &mut self.resolver,
        };
        let mut ctx = CompileContext {
            current_file: source,
            imports: &mut host,
            options: &self.options,
        };
        let output = self.compiler.compile(&text, &mut ctx)?;

        if output.is_empty() {
            debug!(worker = self.id, file = ?source, "empty output; nothing written");
            return Ok(BuildOutcome::Empty);
        }

        self.fs
            .write(dest, output.as_bytes())
            .map_err(|e| ParlessError::WriteError {
                path: dest.to_path_buf(),
                message: format!("{e:#}"),
            })?;
        Ok(BuildOutcome::Written {
            bytes: output.len(),
        })
    }

    fn transition(&mut self, next: WorkerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(ParlessError::ProtocolError(format!(
                "worker {} cannot go from {:?} to {:?}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::InlineCompiler;
    use crate::fs::mock::MockFileSystem;

    fn worker(fs: &MockFileSystem) -> Worker {
        Worker::new(
            0,
            Arc::new(fs.clone()),
            Arc::new(InlineCompiler::new()),
            WorkerSettings::new("/work"),
        )
    }

    #[tokio::test]
    async fn builds_from_preloaded_cache() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/vars.less", ".v { c: red; }");
        fs.add_file("/src/site.less", "@import \"vars\";\n.site {}");

        let mut w = worker(&fs);
        w.initialize(&[
            PathBuf::from("/src/vars.less"),
            PathBuf::from("/src/site.less"),
        ])
        .await
        .unwrap();
        assert_eq!(w.state(), WorkerState::Idle);
        assert_eq!(w.cache().len(), 2);

        let outcome = w
            .build_one(Path::new("/src/site.less"), Path::new("/out/site.css"))
            .unwrap();
        assert!(matches!(outcome, BuildOutcome::Written { .. }));
        assert_eq!(w.state(), WorkerState::Draining);
        assert_eq!(
            fs.text("/out/site.css").as_deref(),
            Some(".v { c: red; }\n.site {}\n")
        );
    }

    #[tokio::test]
    async fn empty_output_is_not_written() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/mixins.less", "// only comments\n");

        let mut w = worker(&fs);
        let outcome = w
            .build_one(Path::new("/src/mixins.less"), Path::new("/out/mixins.css"))
            .unwrap();

        assert_eq!(outcome, BuildOutcome::Empty);
        assert_eq!(w.state(), WorkerState::Draining);
        assert!(fs.text("/out/mixins.css").is_none());
    }

    #[tokio::test]
    async fn missing_source_is_a_read_failure() {
        let fs = MockFileSystem::new();
        let mut w = worker(&fs);

        let err = w
            .build_one(Path::new("/src/gone.less"), Path::new("/out/gone.css"))
            .unwrap_err();
        assert!(
            matches!(err, ParlessError::ReadFailed { ref message, .. } if message == "File not found")
        );
        assert_eq!(w.state(), WorkerState::Idle);
    }

    #[tokio::test]
    async fn failed_preload_leaves_worker_idle() {
        let fs = MockFileSystem::new();
        let mut w = worker(&fs);

        let err = w
            .initialize(&[PathBuf::from("/src/absent.less")])
            .await
            .unwrap_err();
        assert!(matches!(err, ParlessError::ReadFailed { .. }));
        assert_eq!(w.state(), WorkerState::Idle);
    }

    #[test]
    fn shutdown_rejects_further_jobs() {
        let fs = MockFileSystem::new();
        fs.add_file("/src/a.less", ".a{}");
        let mut w = worker(&fs);
        w.build_one(Path::new("/src/a.less"), Path::new("/out/a.css"))
            .unwrap();
        assert_eq!(w.cache().len(), 1);

        w.shutdown();
        w.shutdown();
        assert!(w.cache().is_empty());
        assert_eq!(w.state(), WorkerState::Stopped);

        let err = w
            .build_one(Path::new("/src/a.less"), Path::new("/out/a.css"))
            .unwrap_err();
        assert!(matches!(err, ParlessError::ProtocolError(_)));
    }
}
