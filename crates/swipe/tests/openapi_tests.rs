//! Tests for the OpenAPI document emitter.

use std::path::{Path, PathBuf};

use swipe::{DocGenerator, OpenapiGenerator};
use swipe_model::{ServiceModel, build_service};
use swipe_parse::{Program, ProgramIndex, parse_option};

const USERS_SRC: &str = r#"
pub struct Context;

pub struct User {
    pub name: String,
    pub balance: f64,
    pub tags: Vec<String>,
}

pub trait Users {
    /// Fetch one user.
    fn get(&self, ctx: Context, id: u64, verbose: bool) -> Result<User, ErrNotFound>;
}

#[derive(Debug, Default, thiserror::Error)]
#[error("not found")]
pub struct ErrNotFound;

impl ErrNotFound {
    pub fn status_code(&self) -> i64 {
        404
    }
    pub fn error_code(&self) -> i64 {
        404
    }
}
"#;

fn model_and_index(src: &str, dsl: &str) -> (ServiceModel, Program) {
    let program =
        Program::from_sources(vec![(PathBuf::from("svc/lib.rs"), src.to_string())]).unwrap();
    let expr: syn::Expr = syn::parse_str(dsl).unwrap();
    let opt = parse_option(Path::new("svc/lib.rs"), &expr).unwrap();
    let model = build_service(&program.index, &opt).unwrap();
    (model, program)
}

fn document(src: &str, dsl: &str) -> serde_json::Value {
    let (model, program) = model_and_index(src, dsl);
    let index: &ProgramIndex = &program.index;
    let generator = OpenapiGenerator::new(&model, index);
    serde_json::from_slice(&generator.generate().unwrap()).unwrap()
}

const REST_DSL: &str = r#"service(
    iface(Users),
    transport(
        protocol("http"),
        openapi(
            openapi_info(title("User API"), description("Users"), version("1.0.0")),
            openapi_server(description("prod"), url("https://api.example.com")),
        ),
        method_options(
            signature(Users::get),
            http_method("GET"),
            path("/users/{id}"),
            query_vars(["verbose", "v"]),
        ),
    ),
)"#;

#[test]
fn document_header_and_info() {
    let doc = document(USERS_SRC, REST_DSL);
    assert_eq!(doc["openapi"], "3.0.0");
    assert_eq!(doc["info"]["title"], "User API");
    assert_eq!(doc["info"]["version"], "1.0.0");
    assert_eq!(doc["servers"][0]["url"], "https://api.example.com");
}

#[test]
fn rest_operation_has_parameters_and_responses() {
    let doc = document(USERS_SRC, REST_DSL);
    let operation = &doc["paths"]["/users/{id}"]["get"];
    assert!(operation.is_object(), "expected GET /users/{{id}}: {doc}");
    let params = operation["parameters"].as_array().unwrap();
    let id = params.iter().find(|p| p["name"] == "id").unwrap();
    assert_eq!(id["in"], "path");
    assert_eq!(id["required"], true);
    assert_eq!(id["schema"]["type"], "integer");
    assert_eq!(id["schema"]["format"], "int64");
    let v = params.iter().find(|p| p["name"] == "v").unwrap();
    assert_eq!(v["in"], "query");
    assert_eq!(v["schema"]["type"], "boolean");
    assert!(operation["responses"]["200"].is_object());
    assert_eq!(
        operation["responses"]["500"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/Error"
    );
}

#[test]
fn struct_schemas_recurse_with_lower_camel_properties() {
    let doc = document(USERS_SRC, REST_DSL);
    let schema = &doc["paths"]["/users/{id}"]["get"]["responses"]["200"]["content"]
        ["application/json"]["schema"];
    let user = &schema["properties"]["data"];
    assert_eq!(user["type"], "object");
    assert_eq!(user["properties"]["name"]["type"], "string");
    assert_eq!(user["properties"]["balance"]["type"], "number");
    assert_eq!(user["properties"]["balance"]["format"], "float");
    assert_eq!(user["properties"]["tags"]["type"], "array");
    assert_eq!(user["properties"]["tags"]["items"]["type"], "string");
}

#[test]
fn rest_error_component_is_present() {
    let doc = document(USERS_SRC, REST_DSL);
    assert_eq!(
        doc["components"]["schemas"]["Error"]["properties"]["error"]["type"],
        "string"
    );
}

const JSONRPC_DSL: &str = r#"service(
    iface(Users),
    transport(
        protocol("http"),
        json_rpc(),
        openapi(openapi_info(title("User API"), description("Users"), version("1.0.0"))),
    ),
)"#;

#[test]
fn jsonrpc_operations_wrap_the_envelope() {
    let doc = document(USERS_SRC, JSONRPC_DSL);
    let operation = &doc["paths"]["/get"]["post"];
    assert!(operation.is_object(), "expected POST /get: {doc}");
    let request =
        &operation["requestBody"]["content"]["application/json"]["schema"]["properties"];
    assert_eq!(request["jsonrpc"]["example"], "2.0");
    assert_eq!(request["method"]["enum"][0], "get");
    assert!(request["params"]["properties"]["id"].is_object());
    let response = &operation["responses"]["200"]["content"]["application/json"]["schema"]
        ["properties"];
    assert!(response["result"].is_object());
}

#[test]
fn jsonrpc_error_schemas_are_keyed_by_code() {
    let doc = document(USERS_SRC, JSONRPC_DSL);
    for key in [
        "x-32000...-32099",
        "x-32700",
        "x-32600",
        "x-32601",
        "x-32602",
        "x-32603",
    ] {
        assert!(
            doc["paths"]["/get"]["post"]["responses"][key].is_object(),
            "missing response {key}"
        );
    }
    let schemas = &doc["components"]["schemas"];
    assert_eq!(
        schemas["ParseError"]["properties"]["error"]["properties"]["code"]["example"],
        -32700
    );
    assert_eq!(
        schemas["MethodNotFoundError"]["properties"]["error"]["properties"]["message"]
            ["example"],
        "Method not found"
    );
    assert!(schemas["ServerError"].is_object());
    assert!(schemas["InternalError"].is_object());
}

#[test]
fn output_path_follows_the_transport_kind() {
    let (model, program) = model_and_index(USERS_SRC, REST_DSL);
    let generator = OpenapiGenerator::new(&model, &program.index);
    assert_eq!(generator.filename(), "openapi_rest.json");

    let (model, program) = model_and_index(USERS_SRC, JSONRPC_DSL);
    let generator = OpenapiGenerator::new(&model, &program.index);
    assert_eq!(generator.filename(), "openapi_jsonrpc.json");
}

#[test]
fn tags_apply_per_method_and_by_default() {
    let dsl = r#"service(
        iface(Users),
        transport(
            protocol("http"),
            openapi(
                openapi_info(title("T"), description("D"), version("1")),
                openapi_tags(methods([Users::get]), tags(["accounts"])),
            ),
            method_options(signature(Users::get), path("/users/{id}")),
        ),
    )"#;
    let doc = document(USERS_SRC, dsl);
    assert_eq!(doc["paths"]["/users/{id}"]["get"]["tags"][0], "accounts");
}

#[test]
fn documents_are_deterministic() {
    let (model, program) = model_and_index(USERS_SRC, REST_DSL);
    let generator = OpenapiGenerator::new(&model, &program.index);
    assert_eq!(generator.generate().unwrap(), generator.generate().unwrap());
}
