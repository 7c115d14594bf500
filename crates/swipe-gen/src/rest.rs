//! Transport emission: request/response envelopes, endpoint adapters, the
//! axum server router, the reqwest client, and the error decoder.
//!
//! The JSON-RPC server/client variants live in `jsonrpc`; this module owns
//! everything the two transports share plus the REST-specific emission.

use std::collections::BTreeMap;

use heck::{ToSnakeCase, ToUpperCamelCase};
use quote::{format_ident, quote};
use swipe_model::{ErrorSpec, MethodSpec, ServiceModel};
use swipe_parse::type_short_name;

use crate::convert::write_convert_type;
use crate::writer::SourceWriter;
use crate::{EmitError, SourceGenerator, jsonrpc, middleware};

/// Emits the whole transport surface for one service into the shared
/// generated file.
pub struct TransportGenerator {
    model: ServiceModel,
}

impl TransportGenerator {
    pub fn new(model: ServiceModel) -> Self {
        Self { model }
    }
}

impl SourceGenerator for TransportGenerator {
    fn generate(&self, w: &mut SourceWriter) -> Result<(), EmitError> {
        let model = &self.model;
        emit_envelopes(w, model);
        if model.logging {
            middleware::emit_logging(w, model);
        }
        if model.instrumenting.enable {
            middleware::emit_instrumenting(w, model);
        }
        emit_error_decode(w, model);
        if !model.transport.server_disabled {
            if model.transport.json_rpc.enable {
                jsonrpc::emit_server(w, model);
            } else {
                emit_rest_server(w, model);
            }
        }
        if model.transport.client_enable {
            if model.transport.json_rpc.enable {
                jsonrpc::emit_client(w, model);
            } else {
                emit_rest_client(w, model);
            }
        }
        Ok(())
    }
}

pub(crate) fn request_ident(m: &MethodSpec, id: &str) -> proc_macro2::Ident {
    format_ident!("{}Request{}", m.name.to_upper_camel_case(), id)
}

pub(crate) fn response_ident(m: &MethodSpec, id: &str) -> proc_macro2::Ident {
    format_ident!("{}Response{}", m.name.to_upper_camel_case(), id)
}

pub(crate) fn endpoint_ident(m: &MethodSpec) -> proc_macro2::Ident {
    format_ident!("{}_endpoint", m.name)
}

/// The discovered error spec for the method's error type, when that type
/// carries a transport code method.
pub(crate) fn err_spec<'a>(model: &'a ServiceModel, m: &MethodSpec) -> Option<&'a ErrorSpec> {
    let name = m.err_result.as_ref().and_then(type_short_name)?;
    model.map_code_errors.get(&name)
}

/// The code-method call on the `&ErrType` a response's `failed()` hands
/// out. A value-receiver code method cannot move out of the shared
/// borrow, so it is called on a clone.
pub(crate) fn code_call(spec: &ErrorSpec, method: &str) -> proc_macro2::TokenStream {
    let method = format_ident!("{}", method);
    if spec.by_ref {
        quote! { err.#method() }
    } else {
        quote! { err.clone().#method() }
    }
}

/// Request/response structs plus the endpoint adapter, per method.
fn emit_envelopes(w: &mut SourceWriter, model: &ServiceModel) {
    let serde = format_ident!("{}", w.import("serde", "serde"));
    let trait_ident = format_ident!("{}", model.trait_name);

    for m in &model.methods {
        let req_ident = request_ident(m, &model.id);
        let resp_ident = response_ident(m, &model.id);

        if m.has_params() {
            let fields = m.params.iter().map(|p| {
                let name = format_ident!("{}", p.name);
                let ty = &p.ty;
                quote! { pub #name: #ty }
            });
            w.write(quote! {
                #[derive(Debug, Clone, Default, #serde::Serialize, #serde::Deserialize)]
                #[serde(rename_all = "camelCase", default)]
                pub struct #req_ident {
                    #(#fields,)*
                }
            });
        }

        let mut resp_fields = Vec::new();
        for r in &m.results {
            let name = format_ident!("{}", r.name);
            let ty = &r.ty;
            resp_fields.push(quote! { pub #name: #ty });
        }
        if let Some(err_ty) = &m.err_result {
            resp_fields.push(quote! {
                #[serde(skip)]
                pub err: Option<#err_ty>
            });
        }
        w.write(quote! {
            #[derive(Debug, Clone, Default, #serde::Serialize, #serde::Deserialize)]
            #[serde(rename_all = "camelCase", default)]
            pub struct #resp_ident {
                #(#resp_fields,)*
            }
        });

        if let Some(err_ty) = &m.err_result {
            w.write(quote! {
                impl #resp_ident {
                    pub fn failed(&self) -> Option<&#err_ty> {
                        self.err.as_ref()
                    }
                }
            });
        }

        let endpoint = endpoint_ident(m);
        let method_ident = format_ident!("{}", m.name);
        let mut call_args = Vec::new();
        if let Some(ctx) = &m.ctx_param {
            let ctx_ty = &ctx.ty;
            call_args.push(quote! { <#ctx_ty>::default() });
        }
        for p in &m.params {
            let name = format_ident!("{}", p.name);
            call_args.push(quote! { req.#name });
        }
        let call = {
            let invoke = quote! { svc.#method_ident(#(#call_args),*) };
            if m.is_async {
                quote! { #invoke.await }
            } else {
                invoke
            }
        };
        let req_param = if m.has_params() {
            quote! { , req: #req_ident }
        } else {
            quote! {}
        };
        let body = match (&m.err_result, m.has_results()) {
            (Some(_), true) => {
                let data = format_ident!("{}", m.results[0].name);
                quote! {
                    match #call {
                        Ok(#data) => #resp_ident { #data, err: None },
                        Err(err) => #resp_ident { #data: Default::default(), err: Some(err) },
                    }
                }
            }
            (Some(_), false) => quote! {
                match #call {
                    Ok(_) => #resp_ident { err: None },
                    Err(err) => #resp_ident { err: Some(err) },
                }
            },
            (None, true) => {
                let data = format_ident!("{}", m.results[0].name);
                quote! {
                    let #data = #call;
                    #resp_ident { #data }
                }
            }
            (None, false) => quote! {
                #call;
                #resp_ident {}
            },
        };
        w.write(quote! {
            pub async fn #endpoint<S: #trait_ident>(svc: &S #req_param) -> #resp_ident {
                #body
            }
        });
    }
}

/// The single `error_decode` dispatch over every discovered error code.
fn emit_error_decode(w: &mut SourceWriter, model: &ServiceModel) {
    let mut by_code: BTreeMap<i64, &str> = BTreeMap::new();
    for (name, spec) in &model.map_code_errors {
        if let Some(existing) = by_code.get(&spec.code) {
            tracing::warn!(
                code = spec.code,
                first = existing,
                second = name.as_str(),
                "duplicate error code; keeping the first type"
            );
            continue;
        }
        by_code.insert(spec.code, name);
    }
    let arms = by_code.iter().map(|(code, name)| {
        let ty = format_ident!("{}", name);
        quote! { #code => Box::new(#ty::default()), }
    });
    w.write(quote! {
        pub fn error_decode(code: i64) -> Box<dyn std::error::Error + Send + Sync> {
            match code {
                #(#arms)*
                _ => format!("error code {code}").into(),
            }
        }
    });
}

/// The axum router and one handler per method.
fn emit_rest_server(w: &mut SourceWriter, model: &ServiceModel) {
    let axum = format_ident!("{}", w.import("axum", "axum"));
    let json = format_ident!("{}", w.import("json", "serde_json"));
    let trait_ident = format_ident!("{}", model.trait_name);

    let mut routes = Vec::new();
    for m in &model.methods {
        let mopt = model.transport.method(&m.name);
        let handler = format_ident!("{}_rest_handler", m.name);
        let req_ident = request_ident(m, &model.id);
        let endpoint = endpoint_ident(m);

        let route_path = mopt.route_path(&m.lc_name);
        let verb = format_ident!("{}", mopt.verb().to_lowercase());
        routes.push(quote! {
            .route(#route_path, #axum::routing::#verb(#handler))
        });

        let mut extractors = Vec::new();
        let mut decode = Vec::new();

        extractors.push(quote! {
            #axum::extract::State(state): #axum::extract::State<std::sync::Arc<S>>
        });

        if let Some(decode_fn) = &mopt.server_decode_request_fn {
            extractors.push(quote! { request: #axum::extract::Request });
            decode.push(quote! {
                let req: #req_ident = match (#decode_fn)(request).await {
                    Ok(req) => req,
                    Err(err) => {
                        return (
                            #axum::http::StatusCode::BAD_REQUEST,
                            #axum::Json(#json::json!({ "error": err.to_string() })),
                        )
                            .into_response();
                    }
                };
            });
        } else if m.has_params() {
            let has_path_vars = !mopt.path_vars.is_empty();
            let has_query_vars = !mopt.query_vars.is_empty();
            let has_header_vars = !mopt.header_vars.is_empty();

            if has_path_vars {
                extractors.push(quote! {
                    #axum::extract::Path(path_vars):
                        #axum::extract::Path<std::collections::HashMap<String, String>>
                });
            }
            if has_query_vars {
                extractors.push(quote! {
                    #axum::extract::Query(query):
                        #axum::extract::Query<std::collections::HashMap<String, String>>
                });
            }
            if has_header_vars {
                extractors.push(quote! { headers: #axum::http::HeaderMap });
            }
            if mopt.has_body() {
                extractors.push(quote! { body: Option<#axum::Json<#req_ident>> });
                decode.push(quote! {
                    let mut req: #req_ident = body.map(|b| b.0).unwrap_or_default();
                });
            } else {
                decode.push(quote! {
                    let mut req = #req_ident::default();
                });
            }
            decode.push(quote! {
                let mut errs: Vec<Box<dyn std::error::Error + Send + Sync>> = Vec::new();
            });

            let errs_sink = format_ident!("errs");
            for (var, _) in &mopt.path_vars {
                if let Some(p) = m.params.iter().find(|p| &p.name == var) {
                    let field = format_ident!("{}", p.name);
                    let convert = write_convert_type(
                        quote! { req.#field },
                        quote! { value },
                        &p.ty,
                        Some(&errs_sink),
                        &format!("convert path variable {var} error"),
                    );
                    decode.push(quote! {
                        if let Some(value) = path_vars.get(#var) {
                            #convert
                        }
                    });
                }
            }
            for (field_name, query_name) in &mopt.query_vars {
                if let Some(p) = m.params.iter().find(|p| &p.name == field_name) {
                    let field = format_ident!("{}", p.name);
                    let convert = write_convert_type(
                        quote! { req.#field },
                        quote! { value },
                        &p.ty,
                        Some(&errs_sink),
                        &format!("convert query variable {query_name} error"),
                    );
                    decode.push(quote! {
                        if let Some(value) = query.get(#query_name) {
                            #convert
                        }
                    });
                }
            }
            for (field_name, header_name) in &mopt.header_vars {
                if let Some(p) = m.params.iter().find(|p| &p.name == field_name) {
                    let field = format_ident!("{}", p.name);
                    let convert = write_convert_type(
                        quote! { req.#field },
                        quote! { value },
                        &p.ty,
                        Some(&errs_sink),
                        &format!("convert header {header_name} error"),
                    );
                    decode.push(quote! {
                        if let Some(value) = headers.get(#header_name).and_then(|v| v.to_str().ok()) {
                            #convert
                        }
                    });
                }
            }
            decode.push(quote! {
                if !errs.is_empty() {
                    let message = errs
                        .iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join("; ");
                    return (
                        #axum::http::StatusCode::BAD_REQUEST,
                        #axum::Json(#json::json!({ "error": message })),
                    )
                        .into_response();
                }
            });
        }

        let invoke = if m.has_params() {
            quote! { let resp = #endpoint(state.as_ref(), req).await; }
        } else {
            quote! { let resp = #endpoint(state.as_ref()).await; }
        };

        let encode = if let Some(encode_fn) = &mopt.server_encode_response_fn {
            quote! { (#encode_fn)(resp) }
        } else {
            let err_arm = if m.err_result.is_some() {
                let status = if let Some(spec) = err_spec(model, m) {
                    let code = code_call(spec, "status_code");
                    quote! {
                        #axum::http::StatusCode::from_u16(#code as u16)
                            .unwrap_or(#axum::http::StatusCode::INTERNAL_SERVER_ERROR)
                    }
                } else {
                    quote! { #axum::http::StatusCode::INTERNAL_SERVER_ERROR }
                };
                quote! {
                    if let Some(err) = resp.failed() {
                        let status = #status;
                        return (
                            status,
                            #axum::Json(#json::json!({ "error": err.to_string() })),
                        )
                            .into_response();
                    }
                }
            } else {
                quote! {}
            };
            let success = if !m.has_results() {
                quote! { #axum::http::StatusCode::OK.into_response() }
            } else if model.transport.not_wrap_body {
                let data = format_ident!("{}", m.results[0].name);
                quote! { #axum::Json(resp.#data).into_response() }
            } else if let Some(wrap) = &mopt.wrap_response {
                let data = format_ident!("{}", m.results[0].name);
                quote! { #axum::Json(#json::json!({ #wrap: resp.#data })).into_response() }
            } else {
                quote! { #axum::Json(resp).into_response() }
            };
            quote! {
                #err_arm
                #success
            }
        };

        w.write(quote! {
            async fn #handler<S>(#(#extractors),*) -> #axum::response::Response
            where
                S: #trait_ident + Send + Sync + 'static,
            {
                use #axum::response::IntoResponse;
                #(#decode)*
                #invoke
                #encode
            }
        });
    }

    let router = format_ident!("{}_rest_router", model.id.to_snake_case());
    let wraps = middleware::router_wraps(model);
    w.write(quote! {
        pub fn #router<S>(svc: S) -> #axum::Router
        where
            S: #trait_ident + Clone + Send + Sync + 'static,
        {
            #wraps
            let state = std::sync::Arc::new(svc);
            #axum::Router::new()
                #(#routes)*
                .with_state(state)
        }
    });
}

/// The reqwest-backed client, one method per interface method.
fn emit_rest_client(w: &mut SourceWriter, model: &ServiceModel) {
    let reqwest = format_ident!("{}", w.import("reqwest", "reqwest"));
    let client_ident = format_ident!("{}RestClient", model.id);

    let mut methods = Vec::new();
    for m in &model.methods {
        let mopt = model.transport.method(&m.name);
        let method_ident = format_ident!("{}", m.name);
        let req_ident = request_ident(m, &model.id);
        let resp_ident = response_ident(m, &model.id);

        let params = m.params.iter().map(|p| {
            let name = format_ident!("{}", p.name);
            let ty = &p.ty;
            quote! { #name: #ty }
        });
        let ok_ty = m
            .results
            .first()
            .map(|r| {
                let ty = &r.ty;
                quote! { #ty }
            })
            .unwrap_or(quote! { () });

        let build_req = if m.has_params() {
            let names = m.params.iter().map(|p| format_ident!("{}", p.name));
            quote! { let req = #req_ident { #(#names),* }; }
        } else {
            quote! {}
        };

        // Reduce `{name}` and `{name:regex}` segments to format holes in
        // template order.
        let template = if mopt.path.is_empty() {
            format!("/{}", m.lc_name.to_lowercase())
        } else {
            mopt.path.clone()
        };
        let mut fmt = template.clone();
        let mut fmt_args = Vec::new();
        for (var, regex) in &mopt.path_vars {
            let segment = if regex.is_empty() {
                format!("{{{var}}}")
            } else {
                format!("{{{var}:{regex}}}")
            };
            if let Some(p) = m.params.iter().find(|p| &p.name == var) {
                let field = format_ident!("{}", p.name);
                fmt = fmt.replace(&segment, "{}");
                fmt_args.push(quote! { req.#field });
            }
        }
        let fmt = format!("{{}}{fmt}");
        let url = quote! {
            let url = format!(#fmt, self.base_url #(, #fmt_args)*);
        };

        let verb = format_ident!("{}", mopt.verb());
        let mut build = vec![quote! {
            let mut builder = self.http.request(#reqwest::Method::#verb, url);
        }];
        for (field_name, query_name) in &mopt.query_vars {
            if let Some(p) = m.params.iter().find(|p| &p.name == field_name) {
                let field = format_ident!("{}", p.name);
                build.push(quote! {
                    builder = builder.query(&[(#query_name, format!("{}", req.#field))]);
                });
            }
        }
        for (field_name, header_name) in &mopt.header_vars {
            if let Some(p) = m.params.iter().find(|p| &p.name == field_name) {
                let field = format_ident!("{}", p.name);
                build.push(quote! {
                    builder = builder.header(#header_name, format!("{}", req.#field));
                });
            }
        }
        if mopt.has_body() && m.has_params() {
            build.push(quote! {
                builder = builder.json(&req);
            });
        }
        if let Some(encode_fn) = &mopt.client_encode_request_fn {
            build.push(quote! {
                builder = (#encode_fn)(&req, builder);
            });
        }

        let decode = if let Some(decode_fn) = &mopt.client_decode_response_fn {
            quote! { (#decode_fn)(resp).await }
        } else if !m.has_results() {
            quote! { Ok(()) }
        } else if model.transport.not_wrap_body {
            quote! {
                let body: #ok_ty = resp.json().await?;
                Ok(body)
            }
        } else {
            let data = format_ident!("{}", m.results[0].name);
            quote! {
                let body: #resp_ident = resp.json().await?;
                Ok(body.#data)
            }
        };

        methods.push(quote! {
            pub async fn #method_ident(
                &self,
                #(#params),*
            ) -> Result<#ok_ty, Box<dyn std::error::Error + Send + Sync>> {
                #build_req
                #url
                #(#build)*
                let resp = builder.send().await?;
                if !resp.status().is_success() {
                    return Err(error_decode(i64::from(resp.status().as_u16())));
                }
                #decode
            }
        });
    }

    w.write(quote! {
        #[derive(Debug, Clone)]
        pub struct #client_ident {
            base_url: String,
            http: #reqwest::Client,
        }

        impl #client_ident {
            pub fn new(target: impl Into<String>) -> Self {
                let base: String = target.into();
                Self {
                    base_url: base.trim_end_matches('/').to_string(),
                    http: #reqwest::Client::new(),
                }
            }

            #(#methods)*
        }
    });
}
