//! Configuration model: a struct flattened into bindable leaves.

use heck::ToShoutySnakeCase;
use swipe_parse::{FieldDecl, ProgramIndex, TypeDecl, TypeDeclKind, type_short_name};

/// The configuration-loader model for one `config_env` entry point.
#[derive(Debug, Clone)]
pub struct ConfigModel {
    pub struct_name: String,
    /// The user's initializer expression, emitted verbatim.
    pub init_expr: syn::Expr,
    pub func_name: String,
    /// Leaves of the depth-first struct walk, in declaration order.
    pub fields: Vec<ConfigField>,
}

/// One bindable configuration leaf.
#[derive(Debug, Clone)]
pub struct ConfigField {
    /// Dotted access path from the config root, e.g. `db.dsn`.
    pub field_path: String,
    /// Env-variable name (`_`-joined SHOUTY_SNAKE) or flag name.
    pub name: String,
    pub desc: String,
    pub required: bool,
    pub is_flag: bool,
    pub ty: syn::Type,
}

/// Flatten a config struct depth-first.
///
/// Nested structs contribute `_`-joined name prefixes and dotted field
/// paths; `@env`/`@flag`/`@desc` doc directives override the defaults.
pub fn walk_config(index: &ProgramIndex, decl: &TypeDecl) -> Vec<ConfigField> {
    let mut out = Vec::new();
    let mut visiting = vec![decl.name.clone()];
    walk(index, decl, None, &mut visiting, &mut out);
    out
}

fn walk(
    index: &ProgramIndex,
    decl: &TypeDecl,
    parent: Option<&ConfigField>,
    visiting: &mut Vec<String>,
    out: &mut Vec<ConfigField>,
) {
    for field in decl.fields() {
        let mut opts = field_opts(&field);
        if let Some(parent) = parent {
            opts.name = format!("{}_{}", parent.name, opts.name);
            opts.field_path = format!("{}.{}", parent.field_path, opts.field_path);
        }
        match nested_struct(index, &field) {
            Some(nested) if !visiting.contains(&nested.name) => {
                visiting.push(nested.name.clone());
                walk(index, nested, Some(&opts), visiting, out);
                visiting.pop();
            }
            _ => out.push(opts),
        }
    }
}

fn field_opts(field: &FieldDecl) -> ConfigField {
    let mut opts = ConfigField {
        field_path: field.name.clone(),
        name: field.name.to_shouty_snake_case(),
        desc: String::new(),
        required: false,
        is_flag: false,
        ty: field.ty.clone(),
    };
    for line in &field.docs {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("@env ") {
            let (name, required) = split_directive(rest);
            if !name.is_empty() {
                opts.name = name;
            }
            opts.required = required;
        } else if let Some(rest) = line.strip_prefix("@flag ") {
            let (name, required) = split_directive(rest);
            opts.is_flag = true;
            if !name.is_empty() {
                opts.name = name;
            }
            opts.required = required;
        } else if let Some(rest) = line.strip_prefix("@desc ") {
            opts.desc = rest.trim().to_string();
        }
    }
    opts
}

fn split_directive(rest: &str) -> (String, bool) {
    let mut parts = rest.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default().to_string();
    let required = parts.any(|p| p == "required");
    (name, required)
}

/// The struct declaration a field recurses into, if any. `Url` stays a
/// leaf (bound by URL-parse), as do types outside the loaded program.
fn nested_struct<'a>(index: &'a ProgramIndex, field: &FieldDecl) -> Option<&'a TypeDecl> {
    let name = peel(&field.ty)?;
    if name == "Url" {
        return None;
    }
    let decl = index.type_decl(&name)?;
    matches!(decl.kind, TypeDeclKind::Struct(_)).then_some(decl)
}

fn peel(ty: &syn::Type) -> Option<String> {
    let name = type_short_name(ty)?;
    if matches!(name.as_str(), "Option" | "Box" | "Arc") {
        if let syn::Type::Path(type_path) = ty
            && let Some(segment) = type_path.path.segments.last()
            && let syn::PathArguments::AngleBracketed(args) = &segment.arguments
            && let Some(syn::GenericArgument::Type(inner)) = args.args.first()
        {
            return peel(inner);
        }
        return None;
    }
    Some(name)
}
