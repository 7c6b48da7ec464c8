use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use parless::compile::{CompileContext, Compiler, InlineCompiler};
use parless::errors::{ParlessError, Result};

/// A compiler that:
/// - records which files it was asked to compile
/// - fails with a `CompileError` for files whose name is in `fail_on`
/// - otherwise delegates to the real `InlineCompiler`.
#[derive(Debug, Default)]
pub struct RecordingCompiler {
    compiled: Arc<Mutex<Vec<PathBuf>>>,
    fail_on: Vec<String>,
    inner: InlineCompiler,
}

impl RecordingCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.fail_on.push(file_name.to_string());
        self
    }

    /// Files compiled so far, in call order.
    pub fn compiled(&self) -> Vec<PathBuf> {
        self.compiled.lock().unwrap().clone()
    }
}

impl Compiler for RecordingCompiler {
    fn compile(&self, source: &str, ctx: &mut CompileContext<'_>) -> Result<String> {
        let file = ctx.current_file.to_path_buf();
        self.compiled.lock().unwrap().push(file.clone());

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_on.contains(&name) {
            return Err(ParlessError::CompileError {
                path: file,
                message: "rejected by test compiler".to_string(),
            });
        }

        self.inner.compile(source, ctx)
    }
}
