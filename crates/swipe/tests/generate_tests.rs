//! End-to-end tests for the orchestrator: discovery, emission, cleanup,
//! and writing against a real directory tree.

use std::fs;
use std::path::Path;

use swipe::Swipe;

const SERVICE_RS: &str = r#"
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

const SWIPE_RS: &str = r#"
fn swipe_greeter() {
    build(service(
        iface(Greeter),
        transport(
            protocol("http"),
            client_enable(),
            openapi(openapi_info(title("Greeter"), description("Greets"), version("1.0.0"))),
            method_options(
                signature(Greeter::say),
                http_method("GET"),
                path("/hello/{name}"),
            ),
        ),
    ));
}
"#;

fn write_fixture(dir: &Path) {
    let svc = dir.join("svc");
    fs::create_dir_all(&svc).unwrap();
    fs::write(svc.join("service.rs"), SERVICE_RS).unwrap();
    fs::write(svc.join("swipe.rs"), SWIPE_RS).unwrap();
}

#[test]
fn run_writes_transport_and_openapi_files() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixture(tmp.path());

    let (results, diagnostics) =
        Swipe::new(tmp.path(), vec!["svc".to_string()]).with_version("1.2.3").run();
    assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
    assert_eq!(results.len(), 2, "results: {results:?}");

    let generated = tmp.path().join("svc/swipe_gen.rs");
    let content = fs::read_to_string(&generated).unwrap();
    assert!(content.starts_with("// Code generated by swipe 1.2.3. DO NOT EDIT."));
    assert!(content.contains("// swipe:skip"));
    // The emitted source parses with the front-end.
    syn::parse_file(&content).expect("generated source must parse");

    let openapi = tmp.path().join("svc/openapi_rest.json");
    let doc: serde_json::Value =
        serde_json::from_slice(&fs::read(&openapi).unwrap()).unwrap();
    assert_eq!(doc["openapi"], "3.0.0");
    assert!(doc["paths"]["/hello/{name}"]["get"].is_object());
}

#[test]
fn runs_are_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixture(tmp.path());
    let swipe = Swipe::new(tmp.path(), vec!["svc".to_string()]).with_version("1.2.3");

    let (_, diagnostics) = swipe.run();
    assert!(diagnostics.is_empty());
    let first = fs::read(tmp.path().join("svc/swipe_gen.rs")).unwrap();

    let (_, diagnostics) = swipe.run();
    assert!(diagnostics.is_empty());
    let second = fs::read(tmp.path().join("svc/swipe_gen.rs")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn stale_generated_files_are_removed() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixture(tmp.path());
    let stale_rs = tmp.path().join("svc/old_gen.rs");
    let stale_doc = tmp.path().join("svc/old_gen.json");
    fs::write(&stale_rs, "// Code generated by swipe 0.0.1. DO NOT EDIT.\n").unwrap();
    fs::write(&stale_doc, "{}").unwrap();

    let (_, diagnostics) = Swipe::new(tmp.path(), vec!["svc".to_string()]).run();
    assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
    assert!(!stale_rs.exists(), "stale source must be deleted");
    assert!(!stale_doc.exists(), "stale document must be deleted");
    assert!(tmp.path().join("svc/swipe_gen.rs").exists());
}

#[test]
fn previously_generated_sources_are_not_reloaded() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixture(tmp.path());
    let swipe = Swipe::new(tmp.path(), vec!["svc".to_string()]);

    let (_, diagnostics) = swipe.run();
    assert!(diagnostics.is_empty());
    // A second run parses the tree that now contains swipe_gen.rs; the
    // banner keeps it out of the load set.
    let (_, diagnostics) = swipe.run();
    assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
}

#[test]
fn unknown_top_level_options_are_diagnosed() {
    let tmp = tempfile::tempdir().unwrap();
    let svc = tmp.path().join("svc");
    fs::create_dir_all(&svc).unwrap();
    fs::write(svc.join("swipe.rs"), "fn swipe_bad() { build(wibble()); }").unwrap();

    let (results, diagnostics) = Swipe::new(tmp.path(), vec!["svc".to_string()]).run();
    assert!(results.is_empty());
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].contains("unknown option `wibble`"));
    assert!(diagnostics[0].contains("swipe.rs"));
}

#[test]
fn one_failing_package_does_not_poison_the_other() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixture(tmp.path());
    let bad = tmp.path().join("bad");
    fs::create_dir_all(&bad).unwrap();
    fs::write(bad.join("swipe.rs"), "fn swipe_bad() { build(wibble()); }").unwrap();

    let (results, diagnostics) =
        Swipe::new(tmp.path(), vec!["svc".to_string(), "bad".to_string()]).run();
    assert_eq!(diagnostics.len(), 1, "diagnostics: {diagnostics:?}");
    assert!(!results.is_empty());
    assert!(tmp.path().join("svc/swipe_gen.rs").exists());
    assert!(!bad.join("swipe_gen.rs").exists());
}

#[test]
fn config_entry_points_emit_their_own_file() {
    let tmp = tempfile::tempdir().unwrap();
    let svc = tmp.path().join("cfg");
    fs::create_dir_all(&svc).unwrap();
    fs::write(
        svc.join("config.rs"),
        r#"
#[derive(Debug, Default)]
pub struct AppConfig {
    /// @env HTTP_PORT,required
    pub http_port: u16,
}

fn swipe_config() {
    build(config_env(AppConfig::default(), func_name("load_config")));
}
"#,
    )
    .unwrap();

    let (results, diagnostics) = Swipe::new(tmp.path(), vec!["cfg".to_string()]).run();
    assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
    assert_eq!(results.len(), 1);
    let content = fs::read_to_string(tmp.path().join("cfg/config_gen.rs")).unwrap();
    assert!(content.contains("pub fn load_config()"));
    syn::parse_file(&content).expect("generated source must parse");
}

#[test]
fn markdown_doc_is_written_for_jsonrpc_services() {
    let tmp = tempfile::tempdir().unwrap();
    let svc = tmp.path().join("svc");
    fs::create_dir_all(&svc).unwrap();
    fs::write(svc.join("service.rs"), SERVICE_RS).unwrap();
    fs::write(
        svc.join("swipe.rs"),
        r#"
fn swipe_greeter() {
    build(service(
        iface(Greeter),
        transport(protocol("http"), json_rpc(), markdown_doc()),
    ));
}
"#,
    )
    .unwrap();

    let (_, diagnostics) = Swipe::new(tmp.path(), vec!["svc".to_string()]).run();
    assert!(diagnostics.is_empty(), "diagnostics: {diagnostics:?}");
    let doc = fs::read_to_string(tmp.path().join("svc/jsonrpc_greeter_doc.md")).unwrap();
    assert!(doc.contains("# Greeter JSONRPC Client"));
}
