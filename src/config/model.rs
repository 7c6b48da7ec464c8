// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::compile::CompilerOptions;
use crate::worker::WorkerSettings;

/// Unvalidated configuration, as read from `Parless.toml` or assembled
/// from CLI flags.
///
/// ```toml
/// [build]
/// directory = "styles"
/// outputdir = "public/css"
/// match = "**/*.less"
/// exclude = ["**/_*.less"]
/// workers = 4
/// paths = ["vendor/less"]
///
/// [compiler]
/// compress = true
/// ```
///
/// Every field is optional; [`check_arguments`](crate::config::check_arguments)
/// fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub compiler: CompilerSection,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BuildSection {
    /// Root of the source tree. Default: working directory.
    pub directory: Option<PathBuf>,

    /// Where compiled files go. Default: `directory`.
    pub outputdir: Option<PathBuf>,

    /// Glob (relative to `directory`) selecting candidate sources.
    #[serde(rename = "match")]
    pub match_pattern: Option<String>,

    /// Globs for partials that are never built on their own.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Worker pool size.
    pub workers: Option<usize>,

    /// Extra import search paths, in lookup order.
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Only rebuild targets affected by these files.
    #[serde(default)]
    pub changed: Vec<PathBuf>,

    /// Seconds to wait for every worker to report ready.
    pub ready_timeout: Option<u64>,

    /// Concurrent reads per worker while preloading.
    pub read_batch: Option<usize>,
}

/// `[compiler]` section, passed through to the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompilerSection {
    pub compress: Option<bool>,
}

impl RawConfig {
    /// Fill every unset value in `self` from `fallback`.
    ///
    /// List values are replaced, not merged: a non-empty list in `self`
    /// wins over the fallback's.
    pub fn or(self, fallback: RawConfig) -> RawConfig {
        let (b, f) = (self.build, fallback.build);
        RawConfig {
            build: BuildSection {
                directory: b.directory.or(f.directory),
                outputdir: b.outputdir.or(f.outputdir),
                match_pattern: b.match_pattern.or(f.match_pattern),
                exclude: non_empty_or(b.exclude, f.exclude),
                workers: b.workers.or(f.workers),
                paths: non_empty_or(b.paths, f.paths),
                changed: non_empty_or(b.changed, f.changed),
                ready_timeout: b.ready_timeout.or(f.ready_timeout),
                read_batch: b.read_batch.or(f.read_batch),
            },
            compiler: CompilerSection {
                compress: self.compiler.compress.or(fallback.compiler.compress),
            },
        }
    }

    /// Anchor relative `directory`, `outputdir` and `paths` at `base`.
    ///
    /// `changed` is left alone; it is relative to `directory`.
    pub fn rebase(mut self, base: &Path) -> RawConfig {
        let build = &mut self.build;
        build.directory = build.directory.take().map(|d| base.join(d));
        build.outputdir = build.outputdir.take().map(|d| base.join(d));
        build.paths = build.paths.drain(..).map(|p| base.join(p)).collect();
        self
    }
}

fn non_empty_or<T>(primary: Vec<T>, fallback: Vec<T>) -> Vec<T> {
    if primary.is_empty() { fallback } else { primary }
}

/// Normalised, validated configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Absolute source root.
    pub directory: PathBuf,
    /// Absolute output root.
    pub outputdir: PathBuf,
    pub match_pattern: String,
    pub exclude: Vec<String>,
    pub workers: usize,
    /// Absolute import search paths.
    pub paths: Vec<PathBuf>,
    /// Absolute changed-file filter; empty means every target.
    pub changed: Vec<PathBuf>,
    /// Working directory the run was started from.
    pub cwd: PathBuf,
    pub ready_timeout: Duration,
    pub read_batch: usize,
    pub compiler: CompilerOptions,
}

impl BuildConfig {
    /// Settings every worker of this run is launched with.
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            search_paths: self.paths.clone(),
            cwd: self.cwd.clone(),
            options: self.compiler.clone(),
            read_batch: self.read_batch,
        }
    }
}
