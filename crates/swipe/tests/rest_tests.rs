//! Tests for the REST transport emitter.

use std::path::{Path, PathBuf};

use swipe::{PrettyFormat, SourceGenerator, SourceWriter, TransportGenerator};
use swipe_model::build_service;
use swipe_parse::{Program, parse_option};

const GREETER_SRC: &str = r#"
pub struct Context;

pub trait Greeter {
    /// Say builds a greeting.
    async fn say(&self, ctx: Context, name: String) -> Result<String, ErrUnauthorized>;
}

#[derive(Debug, Default, thiserror::Error)]
#[error("unauthorized")]
pub struct ErrUnauthorized;

impl ErrUnauthorized {
    pub fn status_code(&self) -> i64 {
        403
    }
}

pub struct Hello;

impl Greeter for Hello {
    async fn say(&self, ctx: Context, name: String) -> Result<String, ErrUnauthorized> {
        if name.is_empty() {
            return Err(ErrUnauthorized {});
        }
        Ok(format!("hello {name}"))
    }
}
"#;

fn generate(src: &str, dsl: &str) -> String {
    let program =
        Program::from_sources(vec![(PathBuf::from("svc/lib.rs"), src.to_string())]).unwrap();
    let expr: syn::Expr = syn::parse_str(dsl).unwrap();
    let opt = parse_option(Path::new("svc/lib.rs"), &expr).unwrap();
    let model = build_service(&program.index, &opt).unwrap();
    let mut w = SourceWriter::default();
    TransportGenerator::new(model).generate(&mut w).unwrap();
    w.frame("0.0.0-test", &PrettyFormat).unwrap()
}

const GREETER_DSL: &str = r#"service(
    iface(Greeter),
    transport(
        protocol("http"),
        client_enable(),
        method_options(
            signature(Greeter::say),
            http_method("GET"),
            path("/hello/{name}"),
        ),
    ),
)"#;

#[test]
fn generated_source_reparses() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    syn::parse_file(&out).expect("generated source must parse");
}

#[test]
fn request_struct_carries_non_context_params() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    assert!(out.contains("pub struct SayRequestGreeter"));
    assert!(out.contains("pub name: String"));
    // The context parameter never reaches the wire types.
    assert!(!out.contains("pub ctx"));
}

#[test]
fn response_struct_skips_the_error_slot() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    assert!(out.contains("pub struct SayResponseGreeter"));
    assert!(out.contains("#[serde(skip)]"));
    assert!(out.contains("pub fn failed(&self) -> Option<&ErrUnauthorized>"));
}

#[test]
fn router_registers_one_route_per_method() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    assert!(out.contains(r#""/hello/{name}""#));
    assert!(out.contains("axum::routing::get(say_rest_handler)"));
    assert_eq!(out.matches(".route(").count(), 1);
    assert!(out.contains("pub fn greeter_rest_router"));
}

#[test]
fn handler_decodes_the_path_variable() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    assert!(out.contains(r#"path_vars.get("name")"#));
    assert!(out.contains("axum::extract::Path"));
}

#[test]
fn client_url_substitution_uses_template_order() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    assert!(out.contains(r#""{}/hello/{}""#));
    assert!(out.contains("req.name"));
    assert!(out.contains("pub struct GreeterRestClient"));
}

#[test]
fn client_decodes_errors_from_the_status_code() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    assert!(out.contains("error_decode(i64::from(resp.status().as_u16()))"));
}

#[test]
fn error_decode_has_one_arm_per_error_type() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    assert!(out.contains("pub fn error_decode"));
    assert_eq!(
        out.matches("Box::new(ErrUnauthorized::default())").count(),
        1
    );
    assert!(out.contains(r#"format!("error code {code}")"#));
}

#[test]
fn reference_receiver_code_methods_are_called_directly() {
    let out = generate(GREETER_SRC, GREETER_DSL);
    assert!(out.contains("err.status_code()"));
    assert!(!out.contains("err.clone()"));
}

#[test]
fn value_receiver_code_methods_are_cloned_before_the_call() {
    let src = r#"
pub trait Vault {
    fn open(&self, key: String) -> Result<String, ErrSealed>;
}
#[derive(Debug, Clone, Default, thiserror::Error)]
#[error("sealed")]
pub struct ErrSealed;
impl ErrSealed {
    pub fn status_code(self) -> i64 {
        423
    }
}
pub struct Door;
impl Vault for Door {
    fn open(&self, key: String) -> Result<String, ErrSealed> {
        if key.is_empty() {
            return Err(ErrSealed {});
        }
        Ok(key)
    }
}
"#;
    let dsl = r#"service(iface(Vault), transport(protocol("http")))"#;
    let out = generate(src, dsl);
    assert!(out.contains("err.clone().status_code()"));
    assert!(out.contains("Box::new(ErrSealed::default())"));
}

#[test]
fn default_route_is_the_lowercased_method_name() {
    let dsl = r#"service(iface(Greeter), transport(protocol("http")))"#;
    let out = generate(GREETER_SRC, dsl);
    assert!(out.contains(r#""/say""#));
}

#[test]
fn regex_path_variables_reduce_to_plain_segments() {
    let src = r#"
pub trait Pages {
    fn page(&self, id: u64, name: String) -> Result<String, ErrGone>;
}
#[derive(Debug, Default, thiserror::Error)]
#[error("gone")]
pub struct ErrGone;
impl ErrGone {
    pub fn status_code(&self) -> i64 {
        410
    }
}
"#;
    let dsl = r#"service(
        iface(Pages),
        transport(
            protocol("http"),
            client_enable(),
            method_options(signature(Pages::page), path("/u/{id:[0-9]+}/p/{name}")),
        ),
    )"#;
    let out = generate(src, dsl);
    // The server route keeps plain variables; the client formats both
    // holes in template order.
    assert!(out.contains(r#""/u/{id}/p/{name}""#));
    assert!(out.contains(r#""{}/u/{}/p/{}""#));
    let id_pos = out.find(r#""{}/u/{}/p/{}", self.base_url, req.id, req.name"#);
    assert!(id_pos.is_some(), "format arguments must follow template order");
}

#[test]
fn not_wrap_body_encodes_the_bare_result() {
    let src = r#"
pub struct User {
    pub name: String,
}
pub trait Users {
    fn get(&self, id: u64) -> Result<User, ErrGone>;
}
#[derive(Debug, Default, thiserror::Error)]
#[error("gone")]
pub struct ErrGone;
impl ErrGone {
    pub fn status_code(&self) -> i64 {
        410
    }
}
"#;
    let dsl = r#"service(
        iface(Users),
        transport(
            protocol("http"),
            client_enable(),
            not_wrap_body(),
            method_options(signature(Users::get), path("/users/{id}")),
        ),
    )"#;
    let out = generate(src, dsl);
    assert!(out.contains("axum::Json(resp.data)"));
    assert!(out.contains("let body: User = resp.json().await?"));
    // The wrapped envelope decode is gone on the client side.
    assert!(!out.contains("let body: GetResponseUsers"));
}

#[test]
fn wrap_response_nests_the_result_under_the_named_field() {
    let dsl = r#"service(
        iface(Greeter),
        transport(
            protocol("http"),
            method_options(signature(Greeter::say), wrap_response("greeting")),
        ),
    )"#;
    let out = generate(GREETER_SRC, dsl);
    assert!(out.contains(r#""greeting""#));
    assert!(out.contains("json::json!"));
}

#[test]
fn query_and_header_vars_bind_by_wire_name() {
    let src = r#"
pub trait Search {
    fn find(&self, query: String, api_key: String) -> Result<String, ErrGone>;
}
#[derive(Debug, Default, thiserror::Error)]
#[error("gone")]
pub struct ErrGone;
impl ErrGone {
    pub fn status_code(&self) -> i64 {
        410
    }
}
"#;
    let dsl = r#"service(
        iface(Search),
        transport(
            protocol("http"),
            client_enable(),
            method_options(
                signature(Search::find),
                path("/search"),
                query_vars(["query", "q"]),
                header_vars(["api_key", "X-Api-Key"]),
            ),
        ),
    )"#;
    let out = generate(src, dsl);
    assert!(out.contains(r#"query.get("q")"#));
    assert!(out.contains(r#"headers.get("X-Api-Key")"#));
    assert!(out.contains(r#"builder.query(&[("q""#));
    assert!(out.contains(r#"builder.header("X-Api-Key""#));
}

#[test]
fn server_disabled_skips_router_emission() {
    let dsl = r#"service(
        iface(Greeter),
        transport(protocol("http"), client_enable(), server_disabled()),
    )"#;
    let out = generate(GREETER_SRC, dsl);
    assert!(!out.contains("_rest_router"));
    assert!(out.contains("GreeterRestClient"));
}

#[test]
fn logging_middleware_logs_scalars_and_duration() {
    let dsl = r#"service(
        iface(Greeter),
        transport(protocol("http")),
        logging(),
    )"#;
    let out = generate(GREETER_SRC, dsl);
    assert!(out.contains("pub struct GreeterLoggingMiddleware"));
    assert!(out.contains("tracing::info!"));
    assert!(out.contains("started.elapsed()"));
    assert!(out.contains("GreeterLoggingMiddleware { next: svc }"));
}

#[test]
fn instrumenting_middleware_records_count_and_latency() {
    let dsl = r#"service(
        iface(Greeter),
        transport(protocol("http")),
        instrumenting(namespace("api"), subsystem("greeter")),
    )"#;
    let out = generate(GREETER_SRC, dsl);
    assert!(out.contains("pub struct GreeterInstrumentingMiddleware"));
    assert!(out.contains(r#"metrics::counter!"#));
    assert!(out.contains(r#""request_count""#));
    assert!(out.contains(r#""request_latency_microseconds""#));
    assert!(out.contains(r#""namespace" => "api""#));
}
