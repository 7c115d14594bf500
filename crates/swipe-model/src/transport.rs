//! Transport configuration: the `transport(...)` option subtree.

use std::collections::BTreeMap;

use swipe_openapi::{Contact, Info, License, Server};
use swipe_parse::{OptionNode, ParseError, must_option, path_last_segment};

use crate::ModelError;

/// Parsed transport configuration for one service.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    pub protocol: String,
    /// Accepted and recorded; both backends emit the axum templates.
    pub fast_http: bool,
    pub client_enable: bool,
    pub server_disabled: bool,
    pub not_wrap_body: bool,
    pub json_rpc: JsonRpcOptions,
    pub openapi: OpenapiOptions,
    pub markdown: MarkdownOptions,
    /// "REST" or "JSONRPC"; part of generated identifier names.
    pub prefix: String,
    pub default_method: MethodTransportOptions,
    pub method_options: BTreeMap<String, MethodTransportOptions>,
}

impl TransportOptions {
    /// The effective options for one method: defaults overlaid with the
    /// per-method entry.
    pub fn method(&self, name: &str) -> MethodTransportOptions {
        let mut merged = self.default_method.clone();
        if let Some(opts) = self.method_options.get(name) {
            merged.overlay(opts);
        }
        merged
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsonRpcOptions {
    pub enable: bool,
    pub path: String,
}

impl JsonRpcOptions {
    /// The configured mount path, defaulting to `/rpc`.
    pub fn mount_path(&self) -> &str {
        if self.path.is_empty() { "/rpc" } else { &self.path }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    pub enable: bool,
    pub output: String,
}

#[derive(Debug, Clone, Default)]
pub struct OpenapiOptions {
    pub enable: bool,
    pub output: String,
    pub info: Info,
    pub servers: Vec<Server>,
    pub default_tags: Vec<String>,
    pub method_tags: BTreeMap<String, Vec<String>>,
}

/// Per-method transport settings.
#[derive(Debug, Clone, Default)]
pub struct MethodTransportOptions {
    pub http_method: String,
    pub path: String,
    /// `(name, regex)` pairs in template order; regex is empty for plain
    /// `{name}` segments.
    pub path_vars: Vec<(String, String)>,
    /// `(field, query name)` pairs.
    pub query_vars: Vec<(String, String)>,
    /// `(field, header name)` pairs.
    pub header_vars: Vec<(String, String)>,
    pub wrap_response: Option<String>,
    pub server_decode_request_fn: Option<syn::Expr>,
    pub server_encode_response_fn: Option<syn::Expr>,
    pub client_encode_request_fn: Option<syn::Expr>,
    pub client_decode_response_fn: Option<syn::Expr>,
}

impl MethodTransportOptions {
    /// The effective HTTP verb, defaulting to GET.
    pub fn verb(&self) -> &str {
        if self.http_method.is_empty() {
            "GET"
        } else {
            &self.http_method
        }
    }

    /// Whether the verb carries a request body.
    pub fn has_body(&self) -> bool {
        matches!(self.verb(), "POST" | "PUT" | "PATCH")
    }

    /// The route path with `:regex` suffixes stripped from variables.
    pub fn route_path(&self, lc_name: &str) -> String {
        if self.path.is_empty() {
            return format!("/{}", lc_name.to_lowercase());
        }
        let mut path = self.path.clone();
        for (_, regex) in &self.path_vars {
            if !regex.is_empty() {
                path = path.replace(&format!(":{regex}"), "");
            }
        }
        path
    }

    fn overlay(&mut self, other: &MethodTransportOptions) {
        if !other.http_method.is_empty() {
            self.http_method = other.http_method.clone();
        }
        if !other.path.is_empty() {
            self.path = other.path.clone();
            self.path_vars = other.path_vars.clone();
        }
        if !other.query_vars.is_empty() {
            self.query_vars = other.query_vars.clone();
        }
        if !other.header_vars.is_empty() {
            self.header_vars = other.header_vars.clone();
        }
        if other.wrap_response.is_some() {
            self.wrap_response = other.wrap_response.clone();
        }
        if other.server_decode_request_fn.is_some() {
            self.server_decode_request_fn = other.server_decode_request_fn.clone();
        }
        if other.server_encode_response_fn.is_some() {
            self.server_encode_response_fn = other.server_encode_response_fn.clone();
        }
        if other.client_encode_request_fn.is_some() {
            self.client_encode_request_fn = other.client_encode_request_fn.clone();
        }
        if other.client_decode_response_fn.is_some() {
            self.client_decode_response_fn = other.client_decode_response_fn.clone();
        }
    }
}

/// Parse the `transport(...)` subtree.
pub fn parse_transport(opt: &OptionNode) -> Result<TransportOptions, ModelError> {
    let mut transport = TransportOptions {
        protocol: must_option(opt, "protocol")?.str_value()?.to_string(),
        fast_http: opt.has("fast_enable"),
        client_enable: opt.has("client_enable"),
        server_disabled: opt.has("server_disabled"),
        not_wrap_body: opt.has("not_wrap_body"),
        ..Default::default()
    };

    if let Some(openapi_opt) = opt.at("openapi") {
        transport.openapi.enable = true;
        if let Some(output) = openapi_opt.at("openapi_output") {
            transport.openapi.output = output.str_value()?.to_string();
        }
        if let Some(info) = openapi_opt.at("openapi_info") {
            transport.openapi.info = Info {
                title: must_option(info, "title")?.str_value()?.to_string(),
                description: must_option(info, "description")?.str_value()?.to_string(),
                version: must_option(info, "version")?.str_value()?.to_string(),
                ..Default::default()
            };
        }
        if let Some(contact) = openapi_opt.at("openapi_contact") {
            transport.openapi.info.contact = Some(Contact {
                name: must_option(contact, "name")?.str_value()?.to_string(),
                email: must_option(contact, "email")?.str_value()?.to_string(),
                url: must_option(contact, "url")?.str_value()?.to_string(),
            });
        }
        if let Some(licence) = openapi_opt.at("openapi_licence") {
            transport.openapi.info.license = Some(License {
                name: must_option(licence, "name")?.str_value()?.to_string(),
                url: must_option(licence, "url")?.str_value()?.to_string(),
            });
        }
        for server in openapi_opt.slice("openapi_server") {
            transport.openapi.servers.push(Server {
                description: must_option(server, "description")?.str_value()?.to_string(),
                url: must_option(server, "url")?.str_value()?.to_string(),
            });
        }
        for tags_opt in openapi_opt.slice("openapi_tags") {
            let mut methods = Vec::new();
            if let Some(methods_opt) = tags_opt.at("methods") {
                for path in methods_opt.paths()? {
                    let name =
                        path_last_segment(path).ok_or_else(|| ModelError::NotASelector {
                            name: "methods".to_string(),
                            position: methods_opt.position.clone(),
                        })?;
                    methods.push(name);
                }
            }
            if let Some(tags) = tags_opt.at("tags") {
                let values: Vec<String> = tags.strings()?.to_vec();
                if methods.is_empty() {
                    transport.openapi.default_tags.extend(values);
                } else {
                    for method in &methods {
                        transport
                            .openapi
                            .method_tags
                            .entry(method.clone())
                            .or_default()
                            .extend(values.iter().cloned());
                    }
                }
            }
        }
        if transport.openapi.output.is_empty() {
            transport.openapi.output = "./".to_string();
        }
    }

    if let Some(json_rpc) = opt.at("json_rpc") {
        transport.json_rpc.enable = true;
        if let Some(path) = json_rpc.at("json_rpc_path") {
            transport.json_rpc.path = path.str_value()?.to_string();
        }
    }

    if let Some(markdown) = opt.at("markdown_doc") {
        transport.markdown.enable = true;
        if let Some(output) = markdown.at("markdown_output") {
            transport.markdown.output = output.str_value()?.to_string();
        }
    }

    if let Some(defaults) = opt.at("method_default_options") {
        transport.default_method =
            parse_method_options(defaults, MethodTransportOptions::default())?;
    }

    for method_opt in opt.slice("method_options") {
        let signature = must_option(method_opt, "signature")?;
        let name = path_last_segment(signature.path_value()?).ok_or_else(|| {
            ModelError::NotASelector {
                name: "signature".to_string(),
                position: signature.position.clone(),
            }
        })?;
        let base = transport.method_options.remove(&name).unwrap_or_default();
        let merged = parse_method_options(method_opt, base)?;
        transport.method_options.insert(name, merged);
    }

    transport.prefix = if transport.json_rpc.enable {
        "JSONRPC".to_string()
    } else {
        "REST".to_string()
    };

    Ok(transport)
}

fn parse_method_options(
    opt: &OptionNode,
    mut base: MethodTransportOptions,
) -> Result<MethodTransportOptions, ModelError> {
    if let Some(wrap) = opt.at("wrap_response") {
        base.wrap_response = Some(wrap.str_value()?.to_string());
    }
    if let Some(verb) = opt.at("http_method") {
        base.http_method = verb.str_value()?.to_uppercase();
    }
    if let Some(path_opt) = opt.at("path") {
        base.path = path_opt.str_value()?.to_string();
        base.path_vars = Vec::new();
        let indices = brace_indices(&base.path).map_err(|message| {
            ModelError::Parse(ParseError::Malformed {
                message,
                position: path_opt.position.clone(),
            })
        })?;
        for (start, end) in indices {
            let inner = &base.path[start + 1..end - 1];
            let (name, regex) = inner.split_once(':').unwrap_or((inner, ""));
            base.path_vars.push((name.to_string(), regex.to_string()));
        }
    }
    if let Some(vars) = opt.at("query_vars") {
        base.query_vars = string_pairs(vars)?;
    }
    if let Some(vars) = opt.at("header_vars") {
        base.header_vars = string_pairs(vars)?;
    }
    if let Some(func) = opt.at("server_decode_request_fn") {
        base.server_decode_request_fn = Some(func.expr_value()?);
    }
    if let Some(func) = opt.at("server_encode_response_fn") {
        base.server_encode_response_fn = Some(func.expr_value()?);
    }
    if let Some(func) = opt.at("client_encode_request_fn") {
        base.client_encode_request_fn = Some(func.expr_value()?);
    }
    if let Some(func) = opt.at("client_decode_response_fn") {
        base.client_decode_response_fn = Some(func.expr_value()?);
    }
    Ok(base)
}

fn string_pairs(opt: &OptionNode) -> Result<Vec<(String, String)>, ModelError> {
    let values = opt.strings()?;
    let mut pairs = Vec::new();
    for chunk in values.chunks(2) {
        if let [field, name] = chunk {
            pairs.push((field.clone(), name.clone()));
        }
    }
    Ok(pairs)
}

/// Positions of balanced `{...}` groups in a path template.
///
/// Returns `(start, end)` byte offsets where `end` points one past the
/// closing brace; unbalanced braces are an error.
pub fn brace_indices(s: &str) -> Result<Vec<(usize, usize)>, String> {
    let mut level = 0usize;
    let mut start = 0usize;
    let mut indices = Vec::new();
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'{' => {
                level += 1;
                if level == 1 {
                    start = i;
                }
            }
            b'}' => {
                if level == 0 {
                    return Err(format!("unbalanced braces in {s:?}"));
                }
                level -= 1;
                if level == 0 {
                    indices.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    if level != 0 {
        return Err(format!("unbalanced braces in {s:?}"));
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_template_has_no_vars() {
        assert!(brace_indices("/users").unwrap().is_empty());
    }

    #[test]
    fn templates_capture_name_and_regex_in_order() {
        let path = "/u/{id:[0-9]+}/p/{name}";
        let indices = brace_indices(path).unwrap();
        assert_eq!(indices.len(), 2);
        let inner: Vec<&str> = indices
            .iter()
            .map(|&(s, e)| &path[s + 1..e - 1])
            .collect();
        assert_eq!(inner, ["id:[0-9]+", "name"]);
    }

    #[test]
    fn unbalanced_braces_are_rejected() {
        assert!(brace_indices("/u/{id").is_err());
        assert!(brace_indices("/u/id}").is_err());
    }
}
