// src/config/mod.rs

//! Configuration loading and validation for parless.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load an optional config file from disk (`loader.rs`).
//! - Apply defaults and validate (`validate.rs`), producing a [`BuildConfig`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, load_optional};
pub use model::{BuildConfig, BuildSection, CompilerSection, RawConfig};
pub use validate::check_arguments;
