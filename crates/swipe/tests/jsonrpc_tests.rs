//! Tests for the JSON-RPC transport emitter.

use std::path::{Path, PathBuf};

use swipe::{PrettyFormat, SourceGenerator, SourceWriter, TransportGenerator};
use swipe_model::build_service;
use swipe_parse::{Program, parse_option};

const CALC_SRC: &str = r#"
pub trait Calculator {
    /// Add two numbers.
    fn add(&self, a: i32, b: i32) -> Result<i32, ErrOverflow>;
    /// List every stored result.
    fn get_all(&self) -> Result<Vec<i32>, ErrOverflow>;
}

#[derive(Debug, Default, thiserror::Error)]
#[error("overflow")]
pub struct ErrOverflow;

impl ErrOverflow {
    pub fn error_code(&self) -> i64 {
        -32001
    }
}

pub struct Machine;

impl Calculator for Machine {
    fn add(&self, a: i32, b: i32) -> Result<i32, ErrOverflow> {
        a.checked_add(b).ok_or(ErrOverflow {})
    }
    fn get_all(&self) -> Result<Vec<i32>, ErrOverflow> {
        Ok(vec![])
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

const CALC_DSL: &str = r#"service(
    iface(Calculator),
    transport(protocol("http"), client_enable(), json_rpc()),
)"#;

#[test]
fn generated_source_reparses() {
    let out = generate(CALC_SRC, CALC_DSL);
    syn::parse_file(&out).expect("generated source must parse");
}

#[test]
fn dispatcher_mounts_under_the_default_path() {
    let out = generate(CALC_SRC, CALC_DSL);
    assert!(out.contains(r#""/rpc""#));
    assert!(out.contains("axum::routing::post"));
    assert!(out.contains("pub fn calculator_jsonrpc_router"));
}

#[test]
fn dispatcher_has_one_codec_entry_per_method() {
    let out = generate(CALC_SRC, CALC_DSL);
    // Wire names are lower-camel renderings of the method names.
    assert_eq!(out.matches(r#""add" =>"#).count(), 1);
    assert_eq!(out.matches(r#""getAll" =>"#).count(), 1);
}

#[test]
fn configured_mount_path_wins() {
    let dsl = r#"service(
        iface(Calculator),
        transport(protocol("http"), json_rpc(json_rpc_path("/api/rpc"))),
    )"#;
    let out = generate(CALC_SRC, dsl);
    assert!(out.contains(r#""/api/rpc""#));
    assert!(!out.contains(r#"route("/rpc""#));
}

#[test]
fn envelope_validation_follows_the_spec() {
    let out = generate(CALC_SRC, CALC_DSL);
    assert!(out.contains(r#"Some("2.0")"#));
    assert!(out.contains("-32600"));
    assert!(out.contains("-32601"));
    assert!(out.contains("-32602"));
    assert!(out.contains("is_notification"));
}

#[test]
fn method_errors_surface_their_error_code() {
    let out = generate(CALC_SRC, CALC_DSL);
    assert!(out.contains("err.error_code()"));
    assert!(!out.contains("err.clone()"));
}

#[test]
fn value_receiver_error_codes_are_cloned_before_the_call() {
    let src = r#"
pub trait Meter {
    fn read(&self) -> Result<i64, ErrOffline>;
}
#[derive(Debug, Clone, Default, thiserror::Error)]
#[error("offline")]
pub struct ErrOffline;
impl ErrOffline {
    pub fn error_code(self) -> i64 {
        -32050
    }
}
pub struct Gauge;
impl Meter for Gauge {
    fn read(&self) -> Result<i64, ErrOffline> {
        Err(ErrOffline {})
    }
}
"#;
    let dsl = r#"service(iface(Meter), transport(protocol("http"), json_rpc()))"#;
    let out = generate(src, dsl);
    assert!(out.contains("err.clone().error_code()"));
}

#[test]
fn client_posts_the_jsonrpc_payload() {
    let out = generate(CALC_SRC, CALC_DSL);
    assert!(out.contains("pub struct CalculatorJsonrpcClient"));
    assert!(out.contains(r#""jsonrpc""#));
    assert!(out.contains(r#""2.0""#));
    // Both wire names appear in the payload builders as well as the
    // dispatch arms.
    assert!(out.matches(r#""add""#).count() >= 2);
    assert!(out.matches(r#""getAll""#).count() >= 2);
}

#[test]
fn client_decodes_errors_through_error_decode() {
    let out = generate(CALC_SRC, CALC_DSL);
    assert!(out.contains("error_decode(code)"));
    assert!(out.contains(r#"body.get("error")"#));
}

#[test]
fn error_decode_matches_the_discovered_code() {
    let out = generate(CALC_SRC, CALC_DSL);
    assert!(out.contains("Box::new(ErrOverflow::default())"));
    assert!(out.contains(r#"format!("error code {code}")"#));
}

#[test]
fn request_structs_round_trip_lower_camel_fields() {
    let out = generate(CALC_SRC, CALC_DSL);
    assert!(out.contains("pub struct AddRequestCalculator"));
    assert!(out.contains(r#"#[serde(rename_all = "camelCase", default)]"#));
}

#[test]
fn batch_and_notification_handling_is_emitted() {
    let out = generate(CALC_SRC, CALC_DSL);
    assert!(out.contains("request.as_array()"));
    assert!(out.contains("NO_CONTENT"));
}
