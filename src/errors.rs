// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Variants follow the failure taxonomy of a build run:
//! - reading sources / scanning directories (`ReadFailed`)
//! - import resolution (`NotFound`)
//! - the compiler rejecting input (`CompileError`)
//! - persisting output (`WriteError`)
//! - malformed messages between controller and workers (`ProtocolError`)
//!
//! plus the run-level failures raised by the scheduler.

use std::path::PathBuf;

use thiserror::Error;

use crate::protocol::WorkerId;

#[derive(Error, Debug)]
pub enum ParlessError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to read {path:?}: {message}")]
    ReadFailed { path: PathBuf, message: String },

    #[error("File not found: '{spec}' (imported from {from:?})")]
    NotFound { spec: String, from: PathBuf },

    #[error("Compile error in {path:?}: {message}")]
    CompileError { path: PathBuf, message: String },

    #[error("Failed to write {path:?}: {message}")]
    WriteError { path: PathBuf, message: String },

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Worker {id} reported an error: {message}")]
    WorkerFailed { id: WorkerId, message: String },

    #[error("Worker {id} exited unexpectedly while building {file:?}")]
    WorkerCrashed { id: WorkerId, file: PathBuf },

    #[error("No worker reached the ready state ({spawned} spawned)")]
    QuorumLost { spawned: usize },

    #[error("Workers did not become ready within {secs}s ({ready}/{expected} ready)")]
    ReadyTimeout {
        secs: u64,
        ready: usize,
        expected: usize,
    },

    #[error("Build interrupted")]
    Interrupted,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParlessError {
    pub(crate) fn read_failed(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        ParlessError::ReadFailed {
            path: path.into(),
            message: format!("{err:#}"),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ParlessError>;
