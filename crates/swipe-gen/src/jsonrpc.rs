//! JSON-RPC 2.0 transport emission.
//!
//! The server is a single POST dispatch mounted at the configured path:
//! requests are validated against the 2.0 envelope, batches and
//! notifications handled per spec, and the method name dispatched through
//! one match arm per interface method (the codec map). The client
//! marshals the request struct into `params` and decodes errors through
//! `error_decode(error.code)`.

use heck::ToSnakeCase;
use quote::{format_ident, quote};
use swipe_model::ServiceModel;

use crate::rest::{code_call, endpoint_ident, err_spec, request_ident, response_ident};
use crate::writer::SourceWriter;
use crate::middleware;

pub(crate) fn emit_server(w: &mut SourceWriter, model: &ServiceModel) {
    let axum = format_ident!("{}", w.import("axum", "axum"));
    let json = format_ident!("{}", w.import("json", "serde_json"));
    let trait_ident = format_ident!("{}", model.trait_name);
    let id_snake = model.id.to_snake_case();

    let router = format_ident!("{}_jsonrpc_router", id_snake);
    let handler = format_ident!("{}_jsonrpc_handler", id_snake);
    let single = format_ident!("{}_jsonrpc_single", id_snake);
    let dispatch = format_ident!("{}_jsonrpc_dispatch", id_snake);
    let error_fn = format_ident!("{}_jsonrpc_error", id_snake);
    let mount_path = model.transport.json_rpc.mount_path().to_string();

    // One codec-map arm per method.
    let arms = model.methods.iter().map(|m| {
        let lc_name = &m.lc_name;
        let endpoint = endpoint_ident(m);
        let req_ident = request_ident(m, &model.id);
        let mopt = model.transport.method(&m.name);

        let decode = if let Some(decode_fn) = &mopt.server_decode_request_fn {
            quote! {
                let req: #req_ident = match (#decode_fn)(params) {
                    Ok(req) => req,
                    Err(err) => return Err((-32602, format!("invalid params: {err}"))),
                };
            }
        } else if m.has_params() {
            quote! {
                let req: #req_ident = match #json::from_value(params) {
                    Ok(req) => req,
                    Err(err) => return Err((-32602, format!("invalid params: {err}"))),
                };
            }
        } else {
            quote! {}
        };

        let invoke = if m.has_params() {
            quote! { let resp = #endpoint(svc, req).await; }
        } else {
            quote! { let resp = #endpoint(svc).await; }
        };

        let err_check = if m.err_result.is_some() {
            let code = match err_spec(model, m) {
                Some(spec) => code_call(spec, "error_code"),
                None => quote! { -32603 },
            };
            quote! {
                if let Some(err) = resp.failed() {
                    return Err((#code, err.to_string()));
                }
            }
        } else {
            quote! {}
        };

        let encode = if let Some(encode_fn) = &mopt.server_encode_response_fn {
            quote! { (#encode_fn)(resp) }
        } else {
            quote! { #json::to_value(&resp).map_err(|err| (-32603, err.to_string())) }
        };

        quote! {
            #lc_name => {
                #decode
                #invoke
                #err_check
                #encode
            }
        }
    });
    let arms: Vec<proc_macro2::TokenStream> = arms.collect();

    let wraps = middleware::router_wraps(model);
    w.write(quote! {
        pub fn #router<S>(svc: S) -> #axum::Router
        where
            S: #trait_ident + Clone + Send + Sync + 'static,
        {
            #wraps
            let state = std::sync::Arc::new(svc);
            #axum::Router::new()
                .route(#mount_path, #axum::routing::post(#handler))
                .with_state(state)
        }

        async fn #handler<S>(
            #axum::extract::State(state): #axum::extract::State<std::sync::Arc<S>>,
            #axum::Json(request): #axum::Json<#json::Value>,
        ) -> #axum::response::Response
        where
            S: #trait_ident + Send + Sync + 'static,
        {
            use #axum::response::IntoResponse;
            if let Some(batch) = request.as_array() {
                let mut responses = Vec::new();
                for req in batch {
                    if let Some(resp) = #single(state.as_ref(), req.clone()).await {
                        responses.push(resp);
                    }
                }
                if responses.is_empty() {
                    return #axum::http::StatusCode::NO_CONTENT.into_response();
                }
                return #axum::Json(#json::Value::Array(responses)).into_response();
            }
            match #single(state.as_ref(), request).await {
                Some(resp) => #axum::Json(resp).into_response(),
                None => #axum::http::StatusCode::NO_CONTENT.into_response(),
            }
        }

        async fn #single<S>(svc: &S, request: #json::Value) -> Option<#json::Value>
        where
            S: #trait_ident + Send + Sync,
        {
            let id = request.get("id").cloned();
            let is_notification = id.is_none();

            if request.get("jsonrpc").and_then(|v| v.as_str()) != Some("2.0") {
                if is_notification {
                    return None;
                }
                return Some(#error_fn(-32600, "Invalid Request: missing jsonrpc 2.0", id));
            }
            let method = match request.get("method").and_then(|v| v.as_str()) {
                Some(method) => method,
                None => {
                    if is_notification {
                        return None;
                    }
                    return Some(#error_fn(-32600, "Invalid Request: missing method", id));
                }
            };
            let params = request
                .get("params")
                .cloned()
                .unwrap_or_else(|| #json::json!({}));

            let result = #dispatch(svc, method, params).await;
            if is_notification {
                return None;
            }
            Some(match result {
                Ok(value) => #json::json!({
                    "jsonrpc": "2.0",
                    "result": value,
                    "id": id,
                }),
                Err((code, message)) => #error_fn(code, &message, id),
            })
        }

        async fn #dispatch<S>(
            svc: &S,
            method: &str,
            params: #json::Value,
        ) -> Result<#json::Value, (i64, String)>
        where
            S: #trait_ident + Send + Sync,
        {
            match method {
                #(#arms)*
                _ => Err((-32601, format!("Method not found: {method}"))),
            }
        }

        fn #error_fn(code: i64, message: &str, id: Option<#json::Value>) -> #json::Value {
            #json::json!({
                "jsonrpc": "2.0",
                "error": { "code": code, "message": message },
                "id": id,
            })
        }
    });
}

pub(crate) fn emit_client(w: &mut SourceWriter, model: &ServiceModel) {
    let reqwest = format_ident!("{}", w.import("reqwest", "reqwest"));
    let json = format_ident!("{}", w.import("json", "serde_json"));
    let client_ident = format_ident!("{}JsonrpcClient", model.id);
    let mount_path = model.transport.json_rpc.mount_path().to_string();

    let methods = model.methods.iter().map(|m| {
        let mopt = model.transport.method(&m.name);
        let method_ident = format_ident!("{}", m.name);
        let lc_name = &m.lc_name;
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

        let payload = if m.has_params() {
            let names = m.params.iter().map(|p| format_ident!("{}", p.name));
            let encode = if let Some(encode_fn) = &mopt.client_encode_request_fn {
                quote! { let params = (#encode_fn)(&req)?; }
            } else {
                quote! { let params = #json::to_value(&req)?; }
            };
            quote! {
                let req = #req_ident { #(#names),* };
                #encode
                let payload = #json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": #lc_name,
                    "params": params,
                });
            }
        } else {
            quote! {
                let payload = #json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "method": #lc_name,
                });
            }
        };

        let decode = if let Some(decode_fn) = &mopt.client_decode_response_fn {
            quote! { (#decode_fn)(body) }
        } else if !m.has_results() {
            quote! { Ok(()) }
        } else {
            let data = format_ident!("{}", m.results[0].name);
            quote! {
                let result: #resp_ident =
                    #json::from_value(body.get("result").cloned().unwrap_or_default())?;
                Ok(result.#data)
            }
        };

        quote! {
            pub async fn #method_ident(
                &self,
                #(#params),*
            ) -> Result<#ok_ty, Box<dyn std::error::Error + Send + Sync>> {
                #payload
                let resp = self.http.post(&self.url).json(&payload).send().await?;
                let body: #json::Value = resp.json().await?;
                if let Some(error) = body.get("error") {
                    let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-32603);
                    return Err(error_decode(code));
                }
                #decode
            }
        }
    });
    let methods: Vec<proc_macro2::TokenStream> = methods.collect();

    w.write(quote! {
        #[derive(Debug, Clone)]
        pub struct #client_ident {
            url: String,
            http: #reqwest::Client,
        }

        impl #client_ident {
            pub fn new(target: impl Into<String>) -> Self {
                let base: String = target.into();
                Self {
                    url: format!("{}{}", base.trim_end_matches('/'), #mount_path),
                    http: #reqwest::Client::new(),
                }
            }

            #(#methods)*
        }
    });
}
