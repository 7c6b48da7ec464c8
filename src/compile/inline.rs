// src/compile/inline.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::compile::{CompileContext, Compiler};
use crate::errors::{ParlessError, Result};
use crate::graph::imports::{parse_imports, strip_comments};

/// Import-inlining compiler.
///
/// Produces one self-contained stylesheet per target:
/// - `@import`ed sources are spliced in place, each file at most once per
///   compile unless the import says `(multiple)`;
/// - `(reference)` imports must resolve but contribute no output;
/// - `(inline)` imports are copied verbatim without further processing;
/// - `(optional)` imports may be missing;
/// - plain CSS imports are kept as statements;
/// - comments are dropped and unbalanced braces are rejected.
///
/// It does not evaluate variables, mixins, or nesting.
#[derive(Debug, Clone, Default)]
pub struct InlineCompiler;

impl InlineCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for InlineCompiler {
    fn compile(&self, source: &str, ctx: &mut CompileContext<'_>) -> Result<String> {
        let root = ctx.current_file.to_path_buf();
        let mut seen: HashSet<PathBuf> = HashSet::from([root.clone()]);
        let mut active: Vec<PathBuf> = vec![root.clone()];

        let body = expand(source, &root, ctx, &mut seen, &mut active)?;
        let output = if ctx.options.compress {
            compress(&body)
        } else {
            tidy(&body)
        };

        debug!(file = ?root, bytes = output.len(), inlined = seen.len() - 1, "compiled");
        Ok(output)
    }
}

fn expand(
    text: &str,
    file: &Path,
    ctx: &mut CompileContext<'_>,
    seen: &mut HashSet<PathBuf>,
    active: &mut Vec<PathBuf>,
) -> Result<String> {
    let stripped = strip_comments(text);
    check_braces(&stripped, file)?;

    let mut out = String::with_capacity(stripped.len());
    let mut cursor = 0;

    for spec in parse_imports(text) {
        out.push_str(&stripped[cursor..spec.span.start]);
        cursor = spec.span.end;

        if spec.is_css() {
            out.push_str(&stripped[spec.span.clone()]);
            continue;
        }

        let child = match ctx.imports.resolve(&spec.path, file) {
            Ok(child) => child,
            Err(ParlessError::NotFound { .. }) if spec.options.optional => {
                trace!(file = ?file, spec = %spec.path, "skipping missing optional import");
                continue;
            }
            Err(err) => return Err(err),
        };

        if active.contains(&child) {
            trace!(file = ?file, child = ?child, "import cycle; not descending");
            continue;
        }
        if !spec.options.multiple && !seen.insert(child.clone()) {
            continue;
        }

        let child_text = ctx.imports.read(&child)?;
        if spec.options.reference {
            continue;
        }
        if spec.options.inline {
            out.push_str(&child_text);
            continue;
        }

        active.push(child.clone());
        let expanded = expand(&child_text, &child, ctx, seen, active)?;
        active.pop();
        out.push_str(&expanded);
    }

    out.push_str(&stripped[cursor..]);
    Ok(out)
}

/// Reject unbalanced `{` / `}` outside quoted strings.
fn check_braces(text: &str, file: &Path) -> Result<()> {
    let mut open_lines: Vec<usize> = Vec::new();
    let mut line = 1;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if c == '\n' {
            line += 1;
            quote = None;
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => open_lines.push(line),
            '}' => {
                if open_lines.pop().is_none() {
                    return Err(ParlessError::CompileError {
                        path: file.to_path_buf(),
                        message: format!("unexpected '}}' on line {line}"),
                    });
                }
            }
            _ => {}
        }
    }

    match open_lines.last() {
        Some(opened) => Err(ParlessError::CompileError {
            path: file.to_path_buf(),
            message: format!("unclosed '{{' opened on line {opened}"),
        }),
        None => Ok(()),
    }
}

/// Trim trailing whitespace and collapse runs of blank lines.
fn tidy(body: &str) -> String {
    let mut out = String::new();
    let mut blank_run = false;

    for line in body.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run = true;
            continue;
        }
        if blank_run && !out.is_empty() {
            out.push('\n');
        }
        blank_run = false;
        out.push_str(line);
        out.push('\n');
    }

    out
}

/// Collapse all whitespace and drop it around `{`, `}`, `;` and `,`.
fn compress(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());

    for c in collapsed.chars() {
        match c {
            '{' | '}' | ';' | ',' => {
                if out.ends_with(' ') {
                    out.pop();
                }
                out.push(c);
            }
            ' ' if out.ends_with(['{', '}', ';', ',']) => {}
            _ => out.push(c),
        }
    }

    out
}
