// src/compile/mod.rs

//! Compiler seam.
//!
//! The stylesheet compiler is a pluggable collaborator. Workers hand it the
//! source text plus a [`CompileContext`], whose [`ImportHost`] is the only way
//! the compiler can reach other files. The host is an explicit per-call
//! parameter, so several workers can share one process without sharing any
//! import state.
//!
//! [`InlineCompiler`] is the implementation shipped with the binary.

pub mod inline;

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::FileCache;
use crate::errors::{ParlessError, Result};
use crate::fs::FileSystem;
use crate::graph::ImportResolver;

pub use inline::InlineCompiler;

/// Options passed through to the compiler untouched by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Minify the output.
    #[serde(default)]
    pub compress: bool,
}

/// Capability the compiler uses to find and read imported files.
pub trait ImportHost {
    fn resolve(&mut self, spec: &str, importing_file: &Path) -> Result<PathBuf>;
    fn read(&mut self, path: &Path) -> Result<Arc<str>>;
}

/// Everything a single compile call may use besides the source text.
pub struct CompileContext<'a> {
    pub current_file: &'a Path,
    pub imports: &'a mut dyn ImportHost,
    pub options: &'a CompilerOptions,
}

/// Turns one source file's text into output text.
///
/// An empty string is a valid result (e.g. a file holding only mixin or
/// variable definitions) and is not written to disk.
pub trait Compiler: Send + Sync + Debug {
    fn compile(&self, source: &str, ctx: &mut CompileContext<'_>) -> Result<String>;
}

/// [`ImportHost`] backed by a worker's [`FileCache`].
///
/// Reads are served from the cache; a miss falls back to one synchronous
/// read whose result is cached for later compiles.
pub struct CacheImportHost<'a> {
    pub fs: &'a dyn FileSystem,
    pub cache: &'a mut FileCache,
    pub resolver: &'a mut ImportResolver,
}

impl ImportHost for CacheImportHost<'_> {
    fn resolve(&mut self, spec: &str, importing_file: &Path) -> Result<PathBuf> {
        self.resolver.resolve(spec, importing_file)
    }

    fn read(&mut self, path: &Path) -> Result<Arc<str>> {
        self.cache
            .get_or_load(self.fs, path)
            .map_err(|_| ParlessError::ReadFailed {
                path: path.to_path_buf(),
                message: "File not found".to_string(),
            })
    }
}
