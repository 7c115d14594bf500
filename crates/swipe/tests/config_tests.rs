//! Tests for the configuration-loader emitter.

use std::path::{Path, PathBuf};

use swipe::{ConfigGenerator, PrettyFormat, SourceGenerator, SourceWriter};
use swipe_model::build_config;
use swipe_parse::{Program, parse_option};

const CONFIG_SRC: &str = r#"
#[derive(Debug, Default)]
pub struct AppConfig {
    /// @env HTTP_PORT,required
    /// @desc port the http server listens on
    pub http_port: u16,
    pub db: DbConfig,
    /// @flag verbose
    pub verbose: bool,
}

#[derive(Debug, Default)]
pub struct DbConfig {
    /// @env DSN,required
    /// @desc database connection string
    pub dsn: String,
}
"#;

const CONFIG_DSL: &str = r#"config_env(AppConfig::default(), func_name("load_config"))"#;

fn generate(src: &str, dsl: &str) -> String {
    let program =
        Program::from_sources(vec![(PathBuf::from("svc/lib.rs"), src.to_string())]).unwrap();
    let expr: syn::Expr = syn::parse_str(dsl).unwrap();
    let opt = parse_option(Path::new("svc/lib.rs"), &expr).unwrap();
    let model = build_config(&program.index, &opt).unwrap();
    let mut w = SourceWriter::default();
    ConfigGenerator::new(model).generate(&mut w).unwrap();
    w.frame("0.0.0-test", &PrettyFormat).unwrap()
}

#[test]
fn generated_source_reparses() {
    let out = generate(CONFIG_SRC, CONFIG_DSL);
    syn::parse_file(&out).expect("generated source must parse");
}

#[test]
fn loader_reads_flattened_env_names() {
    let out = generate(CONFIG_SRC, CONFIG_DSL);
    assert!(out.contains("pub fn load_config()"));
    assert!(out.contains(r#"std::env::var("HTTP_PORT")"#));
    assert!(out.contains(r#"std::env::var("DB_DSN")"#));
    assert!(out.contains("cfg.db.dsn"));
}

#[test]
fn loader_initializes_from_the_verbatim_expression() {
    let out = generate(CONFIG_SRC, CONFIG_DSL);
    assert!(out.contains("AppConfig::default()"));
}

#[test]
fn required_fields_are_checked_against_zero_values() {
    let out = generate(CONFIG_SRC, CONFIG_DSL);
    assert!(out.contains(r#""env HTTP_PORT required""#));
    assert!(out.contains(r#""env DB_DSN required""#));
    assert!(out.contains("cfg.db.dsn.is_empty()"));
    assert_eq!(out.matches("required\".into()").count(), 2);
}

#[test]
fn flags_parse_after_env_reads() {
    let out = generate(CONFIG_SRC, CONFIG_DSL);
    assert!(out.contains(r#"clap::Arg::new("verbose")"#));
    assert!(out.contains("get_matches()"));
    let env_pos = out.find(r#"std::env::var("HTTP_PORT")"#).unwrap();
    let flag_pos = out.find("get_matches()").unwrap();
    assert!(env_pos < flag_pos, "env reads must come before flag parsing");
}

#[test]
fn display_dumps_every_binding() {
    let out = generate(CONFIG_SRC, CONFIG_DSL);
    assert!(out.contains("impl std::fmt::Display for AppConfig"));
    assert!(out.contains("HTTP_PORT={} ;port the http server listens on"));
    assert!(out.contains("DB_DSN={} ;database connection string"));
    assert!(out.contains("--verbose {}"));
    assert!(out.contains("self.db.dsn"));
}

#[test]
fn default_loader_name_is_used_without_func_name() {
    let out = generate(CONFIG_SRC, "config_env(AppConfig::default())");
    assert!(out.contains("pub fn load_config()"));
}

#[test]
fn url_fields_bind_by_url_parse() {
    let src = r#"
#[derive(Debug, Default)]
pub struct NetConfig {
    /// @env BASE_URL
    pub base: Url,
    /// @env SITE_URL,required
    pub site: Option<Url>,
}
"#;
    let out = generate(src, r#"config_env(NetConfig::default(), func_name("load_net"))"#);
    assert!(out.contains("<Url>::parse(&value)"));
    assert!(out.contains("cfg.site = Some(parsed)"));
    assert!(out.contains("cfg.base = parsed"));
    // A URL behind Option gates its required check on presence; no
    // Default comparison is emitted for either binding.
    assert!(out.contains("cfg.site.is_none()"));
    assert!(!out.contains("cfg.site == Default::default()"));
    assert!(!out.contains("cfg.base == Default::default()"));
}

#[test]
fn scalar_parse_failures_accumulate() {
    let out = generate(CONFIG_SRC, CONFIG_DSL);
    assert!(out.contains(r#""convert HTTP_PORT error""#));
    assert!(out.contains("errs.push"));
    assert!(out.contains("(cfg, errs)"));
}
