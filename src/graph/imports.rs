// src/graph/imports.rs

//! Extraction of `@import` statements from stylesheet sources.
//!
//! Only the statement shape is understood here; the rest of the language is
//! opaque. Comments are blanked out first (byte offsets and newlines are
//! preserved) so that commented-out imports are ignored and spans stay valid
//! against the original text.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"@import\s*(?:\(\s*(?P<opts>[A-Za-z,\s]*)\)\s*)?(?:url\(\s*['"]?(?P<url>[^'")]+?)['"]?\s*\)|['"](?P<quoted>[^'"]+)['"])[^;]*;"#,
    )
    .expect("import regex is valid")
});

/// Options from the parenthesised list in `@import (optional, reference) "x";`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub css: bool,
    pub less: bool,
    pub optional: bool,
    pub reference: bool,
    pub inline: bool,
    pub multiple: bool,
}

impl ImportOptions {
    fn parse(list: &str) -> Self {
        let mut opts = ImportOptions::default();
        for word in list.split(',').map(str::trim).filter(|w| !w.is_empty()) {
            match word {
                "css" => opts.css = true,
                "less" => opts.less = true,
                "optional" => opts.optional = true,
                "reference" => opts.reference = true,
                "inline" => opts.inline = true,
                "multiple" => opts.multiple = true,
                // `once` is the default behaviour.
                "once" => opts.multiple = false,
                other => tracing::debug!(option = %other, "ignoring unknown import option"),
            }
        }
        opts
    }
}

/// One raw import statement, not yet resolved to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// The specifier exactly as written, e.g. `"mixins/colors"`.
    pub path: String,
    pub options: ImportOptions,
    /// Written as `url(...)` rather than a bare string.
    pub is_url: bool,
    /// Byte range of the whole statement, including the trailing `;`.
    pub span: Range<usize>,
}

impl ImportSpec {
    /// Plain CSS imports are passed through to the output and never loaded.
    ///
    /// `url(...)` imports and `.css` specifiers count as CSS unless the
    /// statement says `(less)`.
    pub fn is_css(&self) -> bool {
        if self.options.less {
            return false;
        }
        self.options.css || self.is_url || self.path.ends_with(".css")
    }
}

/// Parse every `@import` statement out of `contents`, in source order.
pub fn parse_imports(contents: &str) -> Vec<ImportSpec> {
    let stripped = strip_comments(contents);
    IMPORT_RE
        .captures_iter(&stripped)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let (path, is_url) = match (caps.name("url"), caps.name("quoted")) {
                (Some(url), _) => (url.as_str().trim().to_string(), true),
                (None, Some(quoted)) => (quoted.as_str().to_string(), false),
                (None, None) => return None,
            };
            let options = caps
                .name("opts")
                .map(|m| ImportOptions::parse(m.as_str()))
                .unwrap_or_default();
            Some(ImportSpec {
                path,
                options,
                is_url,
                span: whole.range(),
            })
        })
        .collect()
}

/// Replace `//` and `/* */` comments with spaces, keeping newlines and byte
/// offsets intact. Quoted strings are left alone, and `//` inside
/// parentheses (e.g. `url(//cdn/x.css)`) is not a comment.
pub fn strip_comments(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let mut quote: Option<u8> = None;
    let mut paren_depth = 0usize;

    while i < bytes.len() {
        let b = bytes[i];

        if let Some(q) = quote {
            out.push(b);
            if b == b'\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if b == q || b == b'\n' {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' => {
                quote = Some(b);
                out.push(b);
                i += 1;
            }
            b'(' => {
                paren_depth += 1;
                out.push(b);
                i += 1;
            }
            b')' => {
                paren_depth = paren_depth.saturating_sub(1);
                out.push(b);
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = src[i + 2..]
                    .find("*/")
                    .map(|off| i + 2 + off + 2)
                    .unwrap_or(bytes.len());
                blank(&bytes[i..end], &mut out);
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') && paren_depth == 0 => {
                let end = src[i..].find('\n').map(|off| i + off).unwrap_or(bytes.len());
                blank(&bytes[i..end], &mut out);
                i = end;
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Comments start and end on ASCII bytes, so blanking them whole keeps UTF-8 valid.
    String::from_utf8(out).unwrap_or_else(|_| src.to_string())
}

fn blank(segment: &[u8], out: &mut Vec<u8>) {
    for &b in segment {
        out.push(if b == b'\n' { b'\n' } else { b' ' });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(src: &str) -> Vec<String> {
        parse_imports(src).into_iter().map(|s| s.path).collect()
    }

    #[test]
    fn parses_quoted_and_url_imports() {
        let src = r#"
@import "variables";
@import 'mixins/buttons.less';
@import url("theme.less");
.a { color: red; }
"#;
        assert_eq!(paths(src), vec!["variables", "mixins/buttons.less", "theme.less"]);

        let specs = parse_imports(src);
        assert!(!specs[0].is_css());
        assert!(!specs[1].is_css());
        assert!(specs[2].is_url);
        assert!(specs[2].is_css());
    }

    #[test]
    fn less_option_overrides_url_form() {
        let specs = parse_imports(r#"@import (less) url("theme.less");"#);
        assert_eq!(specs.len(), 1);
        assert!(specs[0].is_url);
        assert!(!specs[0].is_css());
    }

    #[test]
    fn parses_options() {
        let specs = parse_imports(r#"@import (optional, reference) "extra";"#);
        assert_eq!(specs.len(), 1);
        assert!(specs[0].options.optional);
        assert!(specs[0].options.reference);
        assert!(!specs[0].is_css());
    }

    #[test]
    fn css_imports_are_flagged() {
        let specs = parse_imports(
            r#"@import "reset.css"; @import url(//cdn.example.com/x.css); @import (css) "y";"#,
        );
        assert_eq!(specs.len(), 3);
        assert!(specs.iter().all(ImportSpec::is_css));

        let forced = parse_imports(r#"@import (less) "legacy.css";"#);
        assert!(!forced[0].is_css());
    }

    #[test]
    fn commented_imports_are_ignored() {
        let src = "// @import \"gone\";\n/* @import \"also-gone\"; */\n@import \"kept\";\n";
        assert_eq!(paths(src), vec!["kept"]);
    }

    #[test]
    fn spans_cover_whole_statement() {
        let src = "a{}\n@import \"x\";\nb{}";
        let spec = &parse_imports(src)[0];
        assert_eq!(&src[spec.span.clone()], "@import \"x\";");
    }

    #[test]
    fn strip_comments_preserves_offsets() {
        let src = "a /* c\nd */ b // tail\nc";
        let stripped = strip_comments(src);
        assert_eq!(stripped.len(), src.len());
        assert_eq!(stripped.lines().count(), src.lines().count());
        assert!(stripped.starts_with("a "));
        assert!(stripped.ends_with("\nc"));
        assert!(!stripped.contains("tail"));
    }
}
