//! The program model: loaded packages and the index over their declarations.
//!
//! A package is a directory of `.rs` files. The loader expands CLI patterns,
//! parses every file with syn, and skips previously generated sources. The
//! [`ProgramIndex`] is built in two passes — declarations first, then method
//! bodies — so a service trait and its error types may reference each other
//! freely.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use syn::{GenericArgument, GenericParam, Item, ItemImpl, PathArguments, Type, TypeParamBound};

use crate::returns::{BlockReturns, ReturnScope, collect_block_returns};
use crate::{LoadError, ObjectHash, extract_docs, hash_object};

const GENERATED_BANNER: &str = "// Code generated by swipe";

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub ast: syn::File,
}

/// A directory of source files loaded as one unit.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub path: PathBuf,
    pub files: Vec<SourceFile>,
}

/// The loaded program: packages named on the command line plus the index
/// over everything they declare.
#[derive(Debug)]
pub struct Program {
    pub packages: Vec<Package>,
    pub index: ProgramIndex,
}

impl Program {
    /// Load the packages matched by `patterns`, resolved against `wd`.
    pub fn load(wd: &Path, patterns: &[String]) -> Result<Program, Vec<LoadError>> {
        let mut errs = Vec::new();
        let mut sources: Vec<(PathBuf, String)> = Vec::new();

        for pattern in patterns {
            let full = wd.join(pattern);
            let expanded = if full.is_dir() {
                format!("{}/**/*.rs", full.display())
            } else {
                full.display().to_string()
            };
            let paths = match glob::glob(&expanded) {
                Ok(paths) => paths,
                Err(source) => {
                    errs.push(LoadError::Pattern {
                        pattern: pattern.clone(),
                        source,
                    });
                    continue;
                }
            };
            let mut matched = 0usize;
            for entry in paths.flatten() {
                if entry.extension().is_none_or(|ext| ext != "rs") {
                    continue;
                }
                matched += 1;
                if is_generated(&entry) {
                    tracing::debug!(path = %entry.display(), "skipping generated file");
                    continue;
                }
                match fs::read_to_string(&entry) {
                    Ok(content) => sources.push((entry, content)),
                    Err(source) => errs.push(LoadError::Read {
                        path: entry,
                        source,
                    }),
                }
            }
            if matched == 0 {
                errs.push(LoadError::EmptyPattern(pattern.clone()));
            }
        }

        if !errs.is_empty() {
            return Err(errs);
        }
        Self::from_sources(sources)
    }

    /// Build a program from in-memory sources, grouped into packages by the
    /// parent directory of each path.
    pub fn from_sources(sources: Vec<(PathBuf, String)>) -> Result<Program, Vec<LoadError>> {
        let mut errs = Vec::new();
        let mut by_dir: BTreeMap<PathBuf, Vec<SourceFile>> = BTreeMap::new();

        for (path, content) in sources {
            match syn::parse_file(&content) {
                Ok(ast) => {
                    let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
                    by_dir.entry(dir).or_default().push(SourceFile { path, ast });
                }
                Err(err) => {
                    let start = err.span().start();
                    errs.push(LoadError::Syntax {
                        path,
                        line: start.line,
                        column: start.column + 1,
                        message: err.to_string(),
                    });
                }
            }
        }
        if !errs.is_empty() {
            return Err(errs);
        }

        let packages: Vec<Package> = by_dir
            .into_iter()
            .map(|(dir, mut files)| {
                files.sort_by(|a, b| a.path.cmp(&b.path));
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "main".to_string());
                Package {
                    name,
                    path: dir,
                    files,
                }
            })
            .collect();

        let index = ProgramIndex::build(&packages);
        Ok(Program { packages, index })
    }
}

fn is_generated(path: &Path) -> bool {
    let by_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("_gen.rs"));
    if by_name {
        return true;
    }
    fs::read_to_string(path)
        .map(|content| content.starts_with(GENERATED_BANNER))
        .unwrap_or(false)
}

/// A trait declaration (a service contract candidate).
#[derive(Debug, Clone)]
pub struct TraitDecl {
    pub package: String,
    pub file: PathBuf,
    pub name: String,
    pub item: syn::ItemTrait,
}

impl TraitDecl {
    /// Trait methods in declaration order.
    pub fn methods(&self) -> Vec<&syn::TraitItemFn> {
        self.item
            .items
            .iter()
            .filter_map(|item| match item {
                syn::TraitItem::Fn(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// Doc comment lines attached to the named method.
    pub fn method_docs(&self, method: &str) -> Vec<String> {
        self.methods()
            .into_iter()
            .find(|f| f.sig.ident == method)
            .map(|f| extract_docs(&f.attrs))
            .unwrap_or_default()
    }
}

/// The shape of a named type declaration.
#[derive(Debug, Clone)]
pub enum TypeDeclKind {
    Struct(syn::ItemStruct),
    Enum(syn::ItemEnum),
}

/// A struct or enum declaration.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub package: String,
    pub file: PathBuf,
    pub name: String,
    pub kind: TypeDeclKind,
}

/// A named struct field with its doc lines.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    pub docs: Vec<String>,
}

impl TypeDecl {
    /// Named fields of a struct declaration; empty for enums and tuple
    /// structs.
    pub fn fields(&self) -> Vec<FieldDecl> {
        match &self.kind {
            TypeDeclKind::Struct(item) => match &item.fields {
                syn::Fields::Named(named) => named
                    .named
                    .iter()
                    .map(|field| FieldDecl {
                        name: field
                            .ident
                            .as_ref()
                            .map(|i| i.to_string())
                            .unwrap_or_default(),
                        ty: field.ty.clone(),
                        docs: extract_docs(&field.attrs),
                    })
                    .collect(),
                _ => Vec::new(),
            },
            TypeDeclKind::Enum(_) => Vec::new(),
        }
    }
}

/// One method implementation, distilled to what the model builder needs.
#[derive(Debug, Clone)]
pub struct MethodImpl {
    pub self_ty: String,
    pub trait_name: Option<String>,
    pub name: String,
    pub receiver_by_ref: bool,
    pub returns: BlockReturns,
}

/// Index over every declaration in the loaded packages.
///
/// This is the explicit value that replaces process-wide hashers and
/// comment maps: built once after loading, threaded into the builder.
#[derive(Debug, Default)]
pub struct ProgramIndex {
    traits: BTreeMap<String, TraitDecl>,
    types: BTreeMap<String, TypeDecl>,
    methods: Vec<MethodImpl>,
    methods_by_type: BTreeMap<String, Vec<usize>>,
    trait_impls: BTreeMap<ObjectHash, Vec<usize>>,
    error_types: BTreeSet<String>,
}

impl ProgramIndex {
    pub fn build(packages: &[Package]) -> Self {
        let mut index = ProgramIndex::default();

        // Pass 1: named declarations and error-trait evidence.
        for package in packages {
            for file in &package.files {
                for item in &file.ast.items {
                    match item {
                        Item::Trait(item_trait) => {
                            index.traits.insert(
                                item_trait.ident.to_string(),
                                TraitDecl {
                                    package: package.name.clone(),
                                    file: file.path.clone(),
                                    name: item_trait.ident.to_string(),
                                    item: item_trait.clone(),
                                },
                            );
                        }
                        Item::Struct(item_struct) => {
                            if derives_error(&item_struct.attrs) {
                                index.error_types.insert(item_struct.ident.to_string());
                            }
                            index.types.insert(
                                item_struct.ident.to_string(),
                                TypeDecl {
                                    package: package.name.clone(),
                                    file: file.path.clone(),
                                    name: item_struct.ident.to_string(),
                                    kind: TypeDeclKind::Struct(item_struct.clone()),
                                },
                            );
                        }
                        Item::Enum(item_enum) => {
                            if derives_error(&item_enum.attrs) {
                                index.error_types.insert(item_enum.ident.to_string());
                            }
                            index.types.insert(
                                item_enum.ident.to_string(),
                                TypeDecl {
                                    package: package.name.clone(),
                                    file: file.path.clone(),
                                    name: item_enum.ident.to_string(),
                                    kind: TypeDeclKind::Enum(item_enum.clone()),
                                },
                            );
                        }
                        Item::Impl(item_impl) => {
                            if let Some(name) = error_impl_target(item_impl) {
                                index.error_types.insert(name);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // Pass 2: method bodies, with the declaration set available.
        for package in packages {
            for file in &package.files {
                for item in &file.ast.items {
                    if let Item::Impl(item_impl) = item {
                        index.index_impl(item_impl);
                    }
                }
            }
        }

        index
    }

    fn index_impl(&mut self, item_impl: &ItemImpl) {
        let Some(self_ty) = crate::type_short_name(&item_impl.self_ty) else {
            return;
        };
        let trait_name = item_impl
            .trait_
            .as_ref()
            .and_then(|(_, path, _)| crate::path_last_segment(path));

        let generics = generic_bounds(item_impl);
        let scope = self.field_scope(&self_ty, &generics);

        for impl_item in &item_impl.items {
            let syn::ImplItem::Fn(method) = impl_item else {
                continue;
            };
            let Some(receiver) = method.sig.receiver() else {
                continue;
            };
            let method_impl = MethodImpl {
                self_ty: self_ty.clone(),
                trait_name: trait_name.clone(),
                name: method.sig.ident.to_string(),
                receiver_by_ref: receiver.reference.is_some(),
                returns: collect_block_returns(&method.block, &scope),
            };
            let idx = self.methods.len();
            self.methods.push(method_impl);
            self.methods_by_type
                .entry(self_ty.clone())
                .or_default()
                .push(idx);
            if let Some(trait_name) = &trait_name {
                self.trait_impls
                    .entry(hash_object(trait_name, &method.sig.ident.to_string()))
                    .or_default()
                    .push(idx);
            }
        }
    }

    fn field_scope(&self, self_ty: &str, generics: &BTreeMap<String, String>) -> ReturnScope {
        let mut scope = ReturnScope::default();
        if let Some(decl) = self.types.get(self_ty) {
            for field in decl.fields() {
                if let Some(trait_name) = trait_of_type(&field.ty, generics, &self.traits) {
                    scope.fields.insert(field.name, trait_name);
                }
            }
        }
        scope
    }

    pub fn trait_decl(&self, name: &str) -> Option<&TraitDecl> {
        self.traits.get(name)
    }

    pub fn type_decl(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    /// All method implementations declared on the named type.
    pub fn methods_of(&self, type_name: &str) -> Vec<&MethodImpl> {
        self.methods_by_type
            .get(type_name)
            .map(|indices| indices.iter().map(|&i| &self.methods[i]).collect())
            .unwrap_or_default()
    }

    /// Every implementation of the given trait method across the program.
    pub fn implementations(&self, trait_name: &str, method: &str) -> Vec<&MethodImpl> {
        self.trait_impls
            .get(&hash_object(trait_name, method))
            .map(|indices| indices.iter().map(|&i| &self.methods[i]).collect())
            .unwrap_or_default()
    }

    /// Whether the named type carries `Error` evidence: an
    /// `impl std::error::Error` block or a `#[derive(Error)]`.
    pub fn is_error_like(&self, type_name: &str) -> bool {
        self.error_types.contains(type_name)
    }
}

fn derives_error(attrs: &[syn::Attribute]) -> bool {
    let mut found = false;
    for attr in attrs {
        if !attr.path().is_ident("derive") {
            continue;
        }
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.segments.last().is_some_and(|s| s.ident == "Error") {
                found = true;
            }
            Ok(())
        });
    }
    found
}

fn error_impl_target(item_impl: &ItemImpl) -> Option<String> {
    let (_, path, _) = item_impl.trait_.as_ref()?;
    if crate::path_last_segment(path)? != "Error" {
        return None;
    }
    crate::type_short_name(&item_impl.self_ty)
}

/// Map from impl generic parameter name to the trait its first bound names.
fn generic_bounds(item_impl: &ItemImpl) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for param in &item_impl.generics.params {
        if let GenericParam::Type(type_param) = param {
            for bound in &type_param.bounds {
                if let TypeParamBound::Trait(trait_bound) = bound
                    && let Some(name) = crate::path_last_segment(&trait_bound.path)
                {
                    out.insert(type_param.ident.to_string(), name);
                    break;
                }
            }
        }
    }
    out
}

/// The trait a field type dispatches through, if any: `dyn Trait` behind
/// `Box`/`Arc`/`Rc` or a reference, a bare trait object, or a generic
/// parameter bound by a trait.
fn trait_of_type(
    ty: &Type,
    generics: &BTreeMap<String, String>,
    traits: &BTreeMap<String, TraitDecl>,
) -> Option<String> {
    match ty {
        Type::TraitObject(object) => {
            for bound in &object.bounds {
                if let TypeParamBound::Trait(trait_bound) = bound {
                    return crate::path_last_segment(&trait_bound.path);
                }
            }
            None
        }
        Type::Reference(reference) => trait_of_type(&reference.elem, generics, traits),
        Type::Paren(paren) => trait_of_type(&paren.elem, generics, traits),
        Type::Path(type_path) => {
            let segment = type_path.path.segments.last()?;
            let name = segment.ident.to_string();
            if let Some(trait_name) = generics.get(&name) {
                return Some(trait_name.clone());
            }
            if matches!(name.as_str(), "Box" | "Arc" | "Rc")
                && let PathArguments::AngleBracketed(args) = &segment.arguments
                && let Some(GenericArgument::Type(inner)) = args.args.first()
            {
                return trait_of_type(inner, generics, traits);
            }
            // A field typed directly by a trait name (rare, but cheap to
            // honour when the declaration set says it is one).
            traits.contains_key(&name).then_some(name)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(src: &str) -> Program {
        Program::from_sources(vec![(PathBuf::from("svc/lib.rs"), src.to_string())]).unwrap()
    }

    #[test]
    fn indexes_traits_and_types() {
        let p = program(
            r#"
            pub trait UserService {
                fn get(&self, id: u64) -> Result<User, ErrNotFound>;
            }
            pub struct User { pub name: String }
            "#,
        );
        assert!(p.index.trait_decl("UserService").is_some());
        assert!(p.index.type_decl("User").is_some());
        assert_eq!(
            p.index.trait_decl("UserService").unwrap().methods().len(),
            1
        );
    }

    #[test]
    fn error_evidence_from_derive_and_impl() {
        let p = program(
            r#"
            #[derive(Debug, thiserror::Error)]
            #[error("not found")]
            pub struct ErrNotFound;

            #[derive(Debug)]
            pub struct ErrManual;
            impl std::fmt::Display for ErrManual {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { Ok(()) }
            }
            impl std::error::Error for ErrManual {}
            "#,
        );
        assert!(p.index.is_error_like("ErrNotFound"));
        assert!(p.index.is_error_like("ErrManual"));
        assert!(!p.index.is_error_like("Missing"));
    }

    #[test]
    fn trait_impls_are_keyed_by_method() {
        let p = program(
            r#"
            pub trait Greeter { fn say(&self, name: String) -> String; }
            pub struct English;
            impl Greeter for English {
                fn say(&self, name: String) -> String { format!("hi {name}") }
            }
            "#,
        );
        let impls = p.index.implementations("Greeter", "say");
        assert_eq!(impls.len(), 1);
        assert_eq!(impls[0].self_ty, "English");
        assert!(impls[0].receiver_by_ref);
    }

    #[test]
    fn generated_sources_are_grouped_by_directory() {
        let p = Program::from_sources(vec![
            (PathBuf::from("a/one.rs"), "pub struct A;".to_string()),
            (PathBuf::from("a/two.rs"), "pub struct B;".to_string()),
            (PathBuf::from("b/one.rs"), "pub struct C;".to_string()),
        ])
        .unwrap();
        assert_eq!(p.packages.len(), 2);
        assert_eq!(p.packages[0].files.len(), 2);
    }
}
