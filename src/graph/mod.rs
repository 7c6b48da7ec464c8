// src/graph/mod.rs

//! Import-dependency graph.
//!
//! - [`scan`] enumerates candidate source files under the target directory.
//! - [`imports`] extracts raw `@import` specifiers from a file's text.
//! - [`resolver`] maps specifiers to absolute paths, with a per-run cache.
//! - [`dependency`] builds the bidirectional graph and decides which
//!   top-level targets a set of changed files affects.

pub mod dependency;
pub mod imports;
pub mod resolver;
pub mod scan;

use std::path::{Component, Path, PathBuf};

pub use dependency::{AffectedTargets, DependencyGraph, SourceFile};
pub use imports::{parse_imports, ImportOptions, ImportSpec};
pub use resolver::ImportResolver;
pub use scan::{scan, SourceMatcher};

/// Lexically normalise a path: drop `.` components and fold `..` into the
/// preceding component. Does not touch the filesystem, so it behaves the same
/// for real and mock filesystems.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
