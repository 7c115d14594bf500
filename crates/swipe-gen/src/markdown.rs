//! Markdown API reference for the JSON-RPC surface.

use std::path::PathBuf;

use heck::ToLowerCamelCase;
use swipe_model::ServiceModel;
use swipe_parse::{ProgramIndex, TypeDecl, TypeDeclKind};

use crate::{DocGenerator, EmitError};

pub struct MarkdownGenerator {
    content: String,
    filename: String,
    output_dir: PathBuf,
}

impl MarkdownGenerator {
    pub fn new(model: &ServiceModel, index: &ProgramIndex) -> Self {
        Self {
            content: render(model, index),
            filename: format!("jsonrpc_{}_doc.md", model.id.to_lowercase()),
            output_dir: PathBuf::from(&model.transport.markdown.output),
        }
    }
}

impl DocGenerator for MarkdownGenerator {
    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn output_dir(&self) -> Option<PathBuf> {
        Some(self.output_dir.clone())
    }

    fn generate(&self) -> Result<Vec<u8>, EmitError> {
        Ok(self.content.clone().into_bytes())
    }
}

fn render(model: &ServiceModel, index: &ProgramIndex) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {} JSONRPC Client\n\n", model.id));
    out.push_str("## API\n## Methods\n\n");

    let mut members: Vec<String> = Vec::new();
    for m in &model.methods {
        for p in &m.params {
            append_member_types(index, &p.ty, &mut members);
        }
        for r in &m.results {
            append_member_types(index, &r.ty, &mut members);
        }
        out.push_str(&format!("<a href=\"#{0}\">{0}</a>\n\n", m.name));
    }

    for m in &model.methods {
        out.push_str(&format!("### <a name=\"{0}\"></a> {0}(", m.name));
        for (i, p) in m.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&p.name);
        }
        out.push_str(") ⇒");
        if let Some(result) = m.results.first() {
            out.push_str(&format!("<code>{}</code>", js_type(index, &result.ty)));
        } else {
            out.push_str("<code>void</code>");
        }
        out.push_str("\n\n");

        // `@name description` directives feed the parameter table; other
        // comment lines flow into the method prose.
        let mut param_comments: Vec<(String, String)> = Vec::new();
        for comment in &m.comments {
            let comment = comment.trim();
            if let Some(rest) = comment.strip_prefix('@') {
                if let Some((name, text)) = rest.split_once(' ') {
                    param_comments.push((name.to_string(), text.to_string()));
                }
                continue;
            }
            out.push_str(&format!("{}\n\n", comment.replace(&m.name, "")));
        }
        out.push_str("\n\n");

        out.push_str("**Throws**:\n\n");
        for e in &m.errors {
            out.push_str(&format!("<code>{}Exception</code>\n\n", e.type_name));
        }
        out.push_str("\n\n");

        if !m.params.is_empty() {
            out.push_str("| Param | Type | Description |\n|------|------|------|\n");
            for p in &m.params {
                let comment = param_comments
                    .iter()
                    .find(|(name, _)| name == &p.name)
                    .map(|(_, text)| text.as_str())
                    .unwrap_or_default();
                out.push_str(&format!(
                    "|{}|<code>{}</code>|{}|\n",
                    p.name,
                    js_type(index, &p.ty),
                    comment
                ));
            }
        }
    }

    let structs: Vec<&TypeDecl> = members
        .iter()
        .filter_map(|name| index.type_decl(name))
        .filter(|decl| matches!(decl.kind, TypeDeclKind::Struct(_)))
        .collect();
    if !structs.is_empty() {
        out.push_str("## Members\n\n");
        for decl in &structs {
            out.push_str(&format!("### {}\n\n", decl.name));
            out.push_str("| Field | Type | Description |\n|------|------|------|\n");
            for field in decl.fields() {
                out.push_str(&format!(
                    "|{}|<code>{}</code>|{}|\n",
                    field.name.to_lower_camel_case(),
                    js_type(index, &field.ty),
                    field.docs.join(" ")
                ));
            }
            out.push('\n');
        }
    }

    let enums: Vec<&TypeDecl> = members
        .iter()
        .filter_map(|name| index.type_decl(name))
        .filter(|decl| matches!(decl.kind, TypeDeclKind::Enum(_)))
        .collect();
    if !enums.is_empty() {
        out.push_str("## Enums\n");
        for decl in &enums {
            out.push_str(&format!(
                "### <a name=\"{0}\"></a> {0}Enum <code>string</code>\n\n",
                decl.name
            ));
            out.push_str("| Name | Value | Description |\n|------|------|------|\n");
            if let TypeDeclKind::Enum(item) = &decl.kind {
                for variant in &item.variants {
                    out.push_str(&format!("|{0}|<code>{0}</code>||\n", variant.ident));
                }
            }
            out.push('\n');
        }
    }

    out
}

/// Register the named types reachable from `ty`, depth-first, once each.
fn append_member_types(index: &ProgramIndex, ty: &syn::Type, members: &mut Vec<String>) {
    let Some(name) = normalized_name(ty) else {
        return;
    };
    if is_primitive(&name) || members.contains(&name) {
        return;
    }
    let Some(decl) = index.type_decl(&name) else {
        return;
    };
    members.push(name);
    if let TypeDeclKind::Struct(_) = decl.kind {
        for field in decl.fields() {
            append_member_types(index, &field.ty, members);
        }
    }
}

fn normalized_name(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Reference(reference) => normalized_name(&reference.elem),
        syn::Type::Paren(paren) => normalized_name(&paren.elem),
        syn::Type::Slice(slice) => normalized_name(&slice.elem),
        syn::Type::Array(array) => normalized_name(&array.elem),
        syn::Type::Path(type_path) => {
            let segment = type_path.path.segments.last()?;
            let name = segment.ident.to_string();
            if matches!(
                name.as_str(),
                "Vec" | "Option" | "Box" | "Arc" | "Rc" | "HashMap" | "BTreeMap"
            ) {
                if let syn::PathArguments::AngleBracketed(args) = &segment.arguments
                    && let Some(syn::GenericArgument::Type(inner)) = args.args.last()
                {
                    return normalized_name(inner);
                }
                return None;
            }
            Some(name)
        }
        _ => None,
    }
}

fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "String"
            | "str"
            | "bool"
            | "i8"
            | "i16"
            | "i32"
            | "i64"
            | "isize"
            | "u8"
            | "u16"
            | "u32"
            | "u64"
            | "usize"
            | "f32"
            | "f64"
            | "DateTime"
            | "NaiveDateTime"
            | "SystemTime"
            | "Uuid"
    )
}

fn js_type(index: &ProgramIndex, ty: &syn::Type) -> String {
    match ty {
        syn::Type::Reference(reference) => js_type(index, &reference.elem),
        syn::Type::Paren(paren) => js_type(index, &paren.elem),
        syn::Type::Slice(slice) => format!("Array.&lt;{}&gt;", js_type(index, &slice.elem)),
        syn::Type::Array(array) => format!("Array.&lt;{}&gt;", js_type(index, &array.elem)),
        syn::Type::TraitObject(_) => "Object".to_string(),
        syn::Type::Path(type_path) => {
            let Some(segment) = type_path.path.segments.last() else {
                return String::new();
            };
            let name = segment.ident.to_string();
            match name.as_str() {
                "String" | "str" | "DateTime" | "NaiveDateTime" | "SystemTime" | "Uuid" => {
                    "string".to_string()
                }
                "bool" => "boolean".to_string(),
                "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64"
                | "usize" | "f32" | "f64" => "number".to_string(),
                "Vec" => match generic(segment) {
                    Some(inner) => format!("Array.&lt;{}&gt;", js_type(index, &inner)),
                    None => "Array".to_string(),
                },
                "HashMap" | "BTreeMap" => match last_generic(segment) {
                    Some(value) => format!("Object.&lt;string, {}&gt;", js_type(index, &value)),
                    None => "Object".to_string(),
                },
                "Option" | "Box" | "Arc" | "Rc" => match generic(segment) {
                    Some(inner) => js_type(index, &inner),
                    None => String::new(),
                },
                _ => match index.type_decl(&name) {
                    Some(decl) if matches!(decl.kind, TypeDeclKind::Enum(_)) => {
                        format!("<a href=\"#{0}\">{0}Enum</a>", name)
                    }
                    Some(_) => format!("<a href=\"#{0}\">{0}</a>", name),
                    None => "Object".to_string(),
                },
            }
        }
        _ => String::new(),
    }
}

fn generic(segment: &syn::PathSegment) -> Option<syn::Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(syn::GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

fn last_generic(segment: &syn::PathSegment) -> Option<syn::Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments {
        for arg in args.args.iter().rev() {
            if let syn::GenericArgument::Type(inner) = arg {
                return Some(inner.clone());
            }
        }
    }
    None
}
