//! The import-aware output writer.
//!
//! One writer lives for the lifetime of one emitted file: it owns the
//! import table (path → alias, auto-disambiguated), collects body
//! fragments, and frames the final file — banner, `use` block, body —
//! through the formatter.

use std::collections::BTreeMap;

use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use crate::EmitError;

/// The formatter collaborator; generated files pass through it last.
pub trait Format {
    fn format(&self, source: &str) -> Result<String, EmitError>;
}

/// The default formatter: parse with syn, print with prettyplease.
#[derive(Debug, Default)]
pub struct PrettyFormat;

impl Format for PrettyFormat {
    fn format(&self, source: &str) -> Result<String, EmitError> {
        let file = syn::parse_file(source).map_err(|err| EmitError::Format {
            message: err.to_string(),
        })?;
        Ok(prettyplease::unparse(&file))
    }
}

/// Buffered output for one generated source file.
pub struct SourceWriter {
    /// The target package path; importing it yields an unqualified alias.
    pkg_path: String,
    imports: BTreeMap<String, String>,
    body: TokenStream,
}

impl Default for SourceWriter {
    fn default() -> Self {
        Self::new("super")
    }
}

impl SourceWriter {
    pub fn new(pkg_path: impl Into<String>) -> Self {
        Self {
            pkg_path: pkg_path.into(),
            imports: BTreeMap::new(),
            body: TokenStream::new(),
        }
    }

    /// Register an import and return the alias to reference it by.
    ///
    /// The same path always returns the same alias; a hint that collides
    /// with another path's alias gets a numeric suffix. Importing the
    /// target package itself returns the empty string: references stay
    /// unqualified.
    pub fn import(&mut self, hint: &str, path: &str) -> String {
        if path == self.pkg_path {
            return String::new();
        }
        if let Some(alias) = self.imports.get(path) {
            return alias.clone();
        }
        let base = sanitize_ident(hint);
        let mut alias = base.clone();
        let mut suffix = 2usize;
        while self.imports.values().any(|existing| existing == &alias) {
            alias = format!("{base}{suffix}");
            suffix += 1;
        }
        self.imports.insert(path.to_string(), alias.clone());
        alias
    }

    /// Append a fragment to the body.
    pub fn write(&mut self, tokens: TokenStream) {
        self.body.extend(tokens);
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The registered imports, path → alias.
    pub fn imports(&self) -> &BTreeMap<String, String> {
        &self.imports
    }

    /// Produce the final file: banner, `use` block in sorted order, body,
    /// piped through the formatter. Generated files live as a sibling
    /// module of the sources they were derived from, so the package's own
    /// items come in through a glob of the parent module.
    pub fn frame(&self, version: &str, formatter: &dyn Format) -> Result<String, EmitError> {
        let mut uses = quote! {
            use super::*;
        };
        for (path, alias) in &self.imports {
            let path_tokens: TokenStream = path.parse().map_err(|_| EmitError::Format {
                message: format!("import path `{path}` is not a valid path"),
            })?;
            let last = path.rsplit("::").next().unwrap_or(path);
            if alias == last {
                uses.extend(quote! { use #path_tokens; });
            } else {
                let alias_ident = format_ident!("{}", alias);
                uses.extend(quote! { use #path_tokens as #alias_ident; });
            }
        }

        let body = &self.body;
        let file = quote! {
            #![allow(clippy::all, dead_code, unused_imports, unused_mut, unused_variables)]
            #uses
            #body
        };
        let formatted = formatter.format(&file.to_string())?;
        Ok(format!(
            "// Code generated by swipe {version}. DO NOT EDIT.\n// swipe:skip\n\n{formatted}"
        ))
    }
}

fn sanitize_ident(hint: &str) -> String {
    let mut out: String = hint
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out = format!("pkg{out}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_returns_same_alias() {
        let mut w = SourceWriter::default();
        assert_eq!(w.import("serde", "serde"), "serde");
        assert_eq!(w.import("serde", "serde"), "serde");
        assert_eq!(w.imports().len(), 1);
    }

    #[test]
    fn conflicting_hints_get_numeric_suffixes() {
        let mut w = SourceWriter::default();
        assert_eq!(w.import("http", "axum::http"), "http");
        assert_eq!(w.import("http", "http"), "http2");
        assert_eq!(w.import("http", "hyper::http"), "http3");
    }

    #[test]
    fn target_package_is_unqualified() {
        let mut w = SourceWriter::default();
        assert_eq!(w.import("svc", "super"), "");
        assert!(w.imports().is_empty());
    }

    #[test]
    fn frame_renders_sorted_imports_and_banner() {
        let mut w = SourceWriter::default();
        let json = w.import("json", "serde_json");
        assert_eq!(json, "json");
        w.import("axum", "axum");
        w.write(quote! {
            pub fn generated() -> i32 { 1 }
        });
        let out = w.frame("0.3.0", &PrettyFormat).unwrap();
        assert!(out.starts_with("// Code generated by swipe 0.3.0. DO NOT EDIT."));
        assert!(out.contains("// swipe:skip"));
        assert!(out.contains("use axum;"));
        assert!(out.contains("use serde_json as json;"));
        assert!(out.contains("use super::*;"));
        let axum_pos = out.find("use axum;").unwrap();
        let json_pos = out.find("use serde_json as json;").unwrap();
        assert!(axum_pos < json_pos);
    }

    #[test]
    fn frame_rejects_invalid_source() {
        let mut w = SourceWriter::default();
        w.write("fn fn fn".parse().unwrap());
        assert!(matches!(
            w.frame("0.3.0", &PrettyFormat),
            Err(EmitError::Format { .. })
        ));
    }
}
