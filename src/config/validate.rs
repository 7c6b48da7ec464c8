// src/config/validate.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::Glob;

use crate::cache::DEFAULT_READ_BATCH;
use crate::compile::CompilerOptions;
use crate::config::model::{BuildConfig, RawConfig};
use crate::errors::{ParlessError, Result};
use crate::graph::normalize_path;

pub const DEFAULT_MATCH: &str = "**/*.less";
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 60;
/// Upper bound for the default worker count.
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Normalise and validate a raw config.
///
/// - `directory` defaults to `cwd`; `outputdir` defaults to `directory`.
/// - Relative paths are resolved against `cwd`, except `changed` entries,
///   which are resolved against `directory`.
/// - `workers` defaults to `min(available_parallelism, 8)` and must be >= 1.
///
/// Pure apart from reading the machine's parallelism; nothing is touched on
/// disk.
pub fn check_arguments(raw: RawConfig, cwd: &Path) -> Result<BuildConfig> {
    let build = raw.build;

    let directory = absolute(cwd, build.directory.as_deref().unwrap_or(cwd));
    let outputdir = match &build.outputdir {
        Some(dir) => absolute(cwd, dir),
        None => directory.clone(),
    };

    let match_pattern = build
        .match_pattern
        .unwrap_or_else(|| DEFAULT_MATCH.to_string());
    validate_glob("match", &match_pattern)?;
    for pattern in &build.exclude {
        validate_glob("exclude", pattern)?;
    }

    let workers = build.workers.unwrap_or_else(default_workers);
    if workers == 0 {
        return Err(ParlessError::ConfigError(
            "workers must be >= 1 (got 0)".to_string(),
        ));
    }

    let ready_timeout = build.ready_timeout.unwrap_or(DEFAULT_READY_TIMEOUT_SECS);
    if ready_timeout == 0 {
        return Err(ParlessError::ConfigError(
            "ready_timeout must be >= 1 second (got 0)".to_string(),
        ));
    }

    let read_batch = build.read_batch.unwrap_or(DEFAULT_READ_BATCH);
    if read_batch == 0 {
        return Err(ParlessError::ConfigError(
            "read_batch must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(BuildConfig {
        paths: build.paths.iter().map(|p| absolute(cwd, p)).collect(),
        changed: build
            .changed
            .iter()
            .map(|p| absolute(&directory, p))
            .collect(),
        directory,
        outputdir,
        match_pattern,
        exclude: build.exclude,
        workers,
        cwd: cwd.to_path_buf(),
        ready_timeout: Duration::from_secs(ready_timeout),
        read_batch,
        compiler: CompilerOptions {
            compress: raw.compiler.compress.unwrap_or(false),
        },
    })
}

/// `min(available_parallelism, 8)`, at least 1.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_WORKERS)
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    normalize_path(&base.join(path))
}

fn validate_glob(field: &str, pattern: &str) -> Result<()> {
    Glob::new(pattern).map(|_| ()).map_err(|e| {
        ParlessError::ConfigError(format!("invalid {field} pattern {pattern:?}: {e}"))
    })
}
