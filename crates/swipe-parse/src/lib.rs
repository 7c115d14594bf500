//! Shared parsing layer for the swipe generator.
//!
//! This crate provides the program model — a syn-backed index over the
//! packages a generation run loads — and the parser for the option DSL
//! found inside `build(...)` entry points.

use std::fmt;
use std::path::{Path, PathBuf};

use syn::{GenericArgument, Lit, Meta, PathArguments, Type};

mod error;
mod option;
mod program;
mod returns;

pub use error::{LoadError, ParseError};
pub use option::{OptionNode, OptionValue, find_build_call, must_option, parse_option};
pub use program::{
    FieldDecl, MethodImpl, Package, Program, ProgramIndex, SourceFile, TraitDecl, TypeDecl,
    TypeDeclKind,
};
pub use returns::{BlockReturns, ReturnResult, ReturnStmt};

/// Source coordinates attached to options and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Build a position from a span inside the given file.
    ///
    /// Requires proc-macro2's `span-locations` feature so line/column
    /// information is available outside a proc-macro context.
    pub fn new(file: &Path, span: proc_macro2::Span) -> Self {
        let start = span.start();
        Self {
            file: file.to_path_buf(),
            line: start.line,
            column: start.column + 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Extract doc comment lines from attributes, trimmed, in source order.
pub fn extract_docs(attrs: &[syn::Attribute]) -> Vec<String> {
    attrs
        .iter()
        .filter_map(|attr| {
            if attr.path().is_ident("doc")
                && let Meta::NameValue(meta) = &attr.meta
                && let syn::Expr::Lit(syn::ExprLit {
                    lit: Lit::Str(s), ..
                }) = &meta.value
            {
                return Some(s.value().trim().to_string());
            }
            None
        })
        .collect()
}

/// Check if a type is context-like: its last path segment is `Context`.
pub fn is_context_type(ty: &Type) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|seg| seg.ident == "Context"),
        Type::Reference(reference) => is_context_type(&reference.elem),
        _ => false,
    }
}

/// Check if a type is `Result<T, E>` and extract T and E.
pub fn extract_result_types(ty: &Type) -> Option<(Type, Type)> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == "Result"
        && let PathArguments::AngleBracketed(args) = &segment.arguments
    {
        let mut iter = args.args.iter();
        if let (Some(GenericArgument::Type(ok)), Some(GenericArgument::Type(err))) =
            (iter.next(), iter.next())
        {
            return Some((ok.clone(), err.clone()));
        }
    }
    None
}

/// Check if a type is `Option<T>` and extract T.
pub fn extract_option_type(ty: &Type) -> Option<Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == "Option"
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

/// Check if a type is `()`.
pub fn is_unit_type(ty: &Type) -> bool {
    if let Type::Tuple(tuple) = ty {
        return tuple.elems.is_empty();
    }
    false
}

/// The short (unqualified) name a type refers to, if it has one.
pub fn type_short_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|seg| seg.ident.to_string()),
        Type::Reference(reference) => type_short_name(&reference.elem),
        Type::Paren(paren) => type_short_name(&paren.elem),
        _ => None,
    }
}

/// The last segment of a path, as a string.
pub fn path_last_segment(path: &syn::Path) -> Option<String> {
    path.segments.last().map(|seg| seg.ident.to_string())
}

/// Stable identity for a named declaration (`owner::name`).
///
/// Replaces the original implementation's shared hashers: identities are
/// derived from canonical paths, so two runs over the same input agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectHash(u64);

/// Stable identity for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeHash(u64);

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Hash a named declaration by its owner and name.
pub fn hash_object(owner: &str, name: &str) -> ObjectHash {
    ObjectHash(fnv1a(format!("{owner}::{name}").as_bytes()))
}

/// Hash a type by its canonical name.
pub fn hash_type(name: &str) -> TypeHash {
    TypeHash(fnv1a(name.as_bytes()))
}
