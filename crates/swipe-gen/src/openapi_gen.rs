//! OpenAPI document emission.
//!
//! Operations derive from the service model; request and response schemas
//! by type-driven recursion through the program index. The document is
//! assembled at construction time so the generator itself stays a pure
//! byte producer.

use std::collections::BTreeMap;
use std::path::PathBuf;

use heck::ToLowerCamelCase;
use serde_json::json;
use swipe_model::{MethodSpec, MethodTransportOptions, ServiceModel};
use swipe_openapi::{
    Components, Media, OpenApi, Operation, Parameter, RequestBody, Response, Schema,
};
use swipe_parse::{ProgramIndex, TypeDeclKind, type_short_name};

use crate::{DocGenerator, EmitError};

pub struct OpenapiGenerator {
    doc: OpenApi,
    filename: String,
    output_dir: PathBuf,
}

impl OpenapiGenerator {
    pub fn new(model: &ServiceModel, index: &ProgramIndex) -> Self {
        let jsonrpc = model.transport.json_rpc.enable;
        let mut doc = OpenApi::new(model.transport.openapi.info.clone());
        doc.servers = model.transport.openapi.servers.clone();
        doc.components = Components {
            schemas: if jsonrpc {
                jsonrpc_error_schemas()
            } else {
                let mut schemas = BTreeMap::new();
                schemas.insert("Error".to_string(), rest_error_schema());
                schemas
            },
        };

        for m in &model.methods {
            let mopt = model.transport.method(&m.name);
            let (verb, path, mut operation) = if jsonrpc {
                (
                    "POST".to_string(),
                    format!("/{}", m.lc_name),
                    jsonrpc_operation(model, index, m),
                )
            } else {
                (
                    mopt.verb().to_string(),
                    mopt.route_path(&m.lc_name),
                    rest_operation(model, index, m, &mopt),
                )
            };
            operation.tags = model
                .transport
                .openapi
                .method_tags
                .get(&m.name)
                .cloned()
                .unwrap_or_else(|| model.transport.openapi.default_tags.clone());
            doc.add_operation(&verb, &path, operation);
        }

        Self {
            doc,
            filename: format!(
                "openapi_{}.json",
                if jsonrpc { "jsonrpc" } else { "rest" }
            ),
            output_dir: PathBuf::from(&model.transport.openapi.output),
        }
    }
}

impl DocGenerator for OpenapiGenerator {
    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn output_dir(&self) -> Option<PathBuf> {
        Some(self.output_dir.clone())
    }

    fn generate(&self) -> Result<Vec<u8>, EmitError> {
        self.doc.to_json().map_err(|err| match err {
            swipe_openapi::OpenApiError::Json(err) => EmitError::Document(err),
            other => EmitError::Format {
                message: other.to_string(),
            },
        })
    }
}

fn rest_operation(
    model: &ServiceModel,
    index: &ProgramIndex,
    m: &MethodSpec,
    mopt: &MethodTransportOptions,
) -> Operation {
    let mut operation = Operation {
        summary: m.name.clone(),
        description: m.comments.join(" "),
        ..Default::default()
    };

    let reserved: Vec<&str> = mopt
        .path_vars
        .iter()
        .map(|(name, _)| name.as_str())
        .chain(mopt.query_vars.iter().map(|(field, _)| field.as_str()))
        .chain(mopt.header_vars.iter().map(|(field, _)| field.as_str()))
        .collect();

    let mut request_props = BTreeMap::new();
    for p in &m.params {
        if reserved.contains(&p.name.as_str()) {
            continue;
        }
        request_props.insert(p.lc_name.clone(), schema_for(index, &p.ty));
    }

    let response_schema = response_schema(model, index, m);
    operation.responses.insert(
        "200".to_string(),
        Response {
            description: "OK".to_string(),
            content: media(response_schema),
        },
    );
    operation.responses.insert(
        "500".to_string(),
        Response {
            description: "FAIL".to_string(),
            content: media(Schema::reference("Error")),
        },
    );

    for (name, _) in &mopt.path_vars {
        operation.parameters.push(Parameter {
            name: name.clone(),
            location: "path".to_string(),
            required: true,
            schema: field_schema(index, m, name),
            ..Default::default()
        });
    }
    for (field, name) in &mopt.query_vars {
        operation.parameters.push(Parameter {
            name: name.clone(),
            location: "query".to_string(),
            schema: field_schema(index, m, field),
            ..Default::default()
        });
    }
    for (field, name) in &mopt.header_vars {
        operation.parameters.push(Parameter {
            name: name.clone(),
            location: "header".to_string(),
            schema: field_schema(index, m, field),
            ..Default::default()
        });
    }

    if mopt.has_body() {
        operation.request_body = Some(RequestBody {
            required: true,
            content: media(Schema::object(request_props)),
        });
    }

    operation
}

fn jsonrpc_operation(model: &ServiceModel, index: &ProgramIndex, m: &MethodSpec) -> Operation {
    let mut request_props = BTreeMap::new();
    for p in &m.params {
        request_props.insert(p.lc_name.clone(), schema_for(index, &p.ty));
    }

    let request = Schema {
        schema_type: "object".to_string(),
        properties: BTreeMap::from([
            (
                "jsonrpc".to_string(),
                Schema::typed("string").with_example(json!("2.0")),
            ),
            (
                "id".to_string(),
                Schema::typed("string")
                    .with_example(json!("c9b14c57-7503-447a-9fb9-be6f8920f31f")),
            ),
            (
                "method".to_string(),
                Schema {
                    schema_type: "string".to_string(),
                    enum_values: vec![m.lc_name.clone()],
                    ..Default::default()
                },
            ),
            ("params".to_string(), Schema::object(request_props)),
        ]),
        ..Default::default()
    };

    let response = Schema {
        schema_type: "object".to_string(),
        properties: BTreeMap::from([
            (
                "jsonrpc".to_string(),
                Schema::typed("string").with_example(json!("2.0")),
            ),
            (
                "id".to_string(),
                Schema::typed("string")
                    .with_example(json!("c9b14c57-7503-447a-9fb9-be6f8920f31f")),
            ),
            ("result".to_string(), response_schema(model, index, m)),
        ]),
        ..Default::default()
    };

    let mut operation = Operation {
        summary: m.name.clone(),
        description: m.comments.join(" "),
        request_body: Some(RequestBody {
            required: true,
            content: media(request),
        }),
        ..Default::default()
    };
    operation.responses.insert(
        "200".to_string(),
        Response {
            description: "OK".to_string(),
            content: media(response),
        },
    );
    for (key, description, schema) in [
        (
            "x-32000...-32099",
            "Server error. Reserved for implementation-defined server-errors.",
            "ServerError",
        ),
        (
            "x-32700",
            "Parse error. Invalid JSON was received by the server. An error occurred on the server while parsing the JSON text.",
            "ParseError",
        ),
        (
            "x-32600",
            "Invalid Request. The JSON sent is not a valid Request object.",
            "InvalidRequestError",
        ),
        (
            "x-32601",
            "Method not found. The method does not exist / is not available.",
            "MethodNotFoundError",
        ),
        (
            "x-32602",
            "Invalid params. Invalid method parameters.",
            "InvalidParamsError",
        ),
        (
            "x-32603",
            "Internal error. Internal JSON-RPC error.",
            "InternalError",
        ),
    ] {
        operation.responses.insert(
            key.to_string(),
            Response {
                description: description.to_string(),
                content: media(Schema::reference(schema)),
            },
        );
    }
    operation
}

fn response_schema(model: &ServiceModel, index: &ProgramIndex, m: &MethodSpec) -> Schema {
    if model.transport.not_wrap_body
        && let Some(result) = m.results.first()
    {
        return schema_for(index, &result.ty);
    }
    let mut props = BTreeMap::new();
    for r in &m.results {
        props.insert(r.lc_name.clone(), schema_for(index, &r.ty));
    }
    Schema::object(props)
}

fn field_schema(index: &ProgramIndex, m: &MethodSpec, field: &str) -> Option<Schema> {
    m.params
        .iter()
        .find(|p| p.name == field)
        .map(|p| schema_for(index, &p.ty))
}

fn media(schema: Schema) -> BTreeMap<String, Media> {
    BTreeMap::from([("application/json".to_string(), Media { schema })])
}

/// Type-driven schema derivation.
pub fn schema_for(index: &ProgramIndex, ty: &syn::Type) -> Schema {
    schema_for_guarded(index, ty, &mut Vec::new())
}

fn schema_for_guarded(index: &ProgramIndex, ty: &syn::Type, visiting: &mut Vec<String>) -> Schema {
    match ty {
        syn::Type::Reference(reference) => schema_for_guarded(index, &reference.elem, visiting),
        syn::Type::Paren(paren) => schema_for_guarded(index, &paren.elem, visiting),
        syn::Type::Slice(slice) => {
            Schema::array(schema_for_guarded(index, &slice.elem, visiting))
        }
        syn::Type::Array(array) => Schema::array(schema_for_guarded(index, &array.elem, visiting)),
        syn::Type::Path(type_path) => {
            let Some(segment) = type_path.path.segments.last() else {
                return Schema::default();
            };
            let name = segment.ident.to_string();
            match name.as_str() {
                "String" | "str" => Schema::formatted("string", "string").with_example(json!("abc")),
                "bool" => Schema::typed("boolean").with_example(json!(true)),
                "i8" | "i16" | "u8" | "u16" => Schema::typed("integer").with_example(json!(1)),
                "i32" | "u32" => Schema::formatted("integer", "int32").with_example(json!(1)),
                "i64" | "u64" | "isize" | "usize" => {
                    Schema::formatted("integer", "int64").with_example(json!(1))
                }
                "f32" | "f64" => Schema::formatted("number", "float").with_example(json!(1.11)),
                "Vec" => match generic_arg(segment) {
                    Some(inner) if type_short_name(&inner).as_deref() == Some("u8") => {
                        Schema::formatted("string", "byte")
                    }
                    Some(inner) => Schema::array(schema_for_guarded(index, &inner, visiting)),
                    None => Schema::typed("array"),
                },
                "Option" | "Box" | "Arc" | "Rc" => match generic_arg(segment) {
                    Some(inner) => schema_for_guarded(index, &inner, visiting),
                    None => Schema::default(),
                },
                "DateTime" | "NaiveDateTime" | "SystemTime" => {
                    Schema::formatted("string", "date-time")
                        .with_example(json!("1985-02-04T00:00:00.00Z"))
                }
                "Uuid" => Schema::formatted("string", "uuid")
                    .with_example(json!("d5c02d83-6fbc-4dd7-8416-9f85ed80de46")),
                "HashMap" | "BTreeMap" => Schema::typed("object"),
                _ => named_schema(index, &name, visiting),
            }
        }
        _ => Schema::default(),
    }
}

fn named_schema(index: &ProgramIndex, name: &str, visiting: &mut Vec<String>) -> Schema {
    if visiting.iter().any(|seen| seen == name) {
        return Schema::typed("object");
    }
    let Some(decl) = index.type_decl(name) else {
        return Schema::default();
    };
    match &decl.kind {
        TypeDeclKind::Struct(_) => {
            visiting.push(name.to_string());
            let mut props = BTreeMap::new();
            for field in decl.fields() {
                props.insert(
                    field.name.to_lower_camel_case(),
                    schema_for_guarded(index, &field.ty, visiting),
                );
            }
            visiting.pop();
            Schema::object(props)
        }
        TypeDeclKind::Enum(item) => Schema {
            schema_type: "string".to_string(),
            enum_values: item.variants.iter().map(|v| v.ident.to_string()).collect(),
            ..Default::default()
        },
    }
}

fn generic_arg(segment: &syn::PathSegment) -> Option<syn::Type> {
    if let syn::PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(syn::GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

fn rest_error_schema() -> Schema {
    Schema::object(BTreeMap::from([(
        "error".to_string(),
        Schema::typed("string"),
    )]))
}

fn jsonrpc_error_schemas() -> BTreeMap<String, Schema> {
    let envelope = |code: Option<i64>, message: Option<&str>| {
        let mut error_props = BTreeMap::from([
            ("code".to_string(), Schema::typed("integer")),
            ("message".to_string(), Schema::typed("string")),
        ]);
        if let Some(code) = code {
            error_props.insert(
                "code".to_string(),
                Schema::typed("integer").with_example(json!(code)),
            );
        }
        if let Some(message) = message {
            error_props.insert(
                "message".to_string(),
                Schema::typed("string").with_example(json!(message)),
            );
        }
        Schema::object(BTreeMap::from([
            (
                "jsonrpc".to_string(),
                Schema::typed("string").with_example(json!("2.0")),
            ),
            (
                "id".to_string(),
                Schema::typed("string")
                    .with_example(json!("1f1ecd1b-d729-40cd-b6f4-4011f69811fe")),
            ),
            ("error".to_string(), Schema::object(error_props)),
        ]))
    };

    BTreeMap::from([
        ("ServerError".to_string(), envelope(None, None)),
        (
            "ParseError".to_string(),
            envelope(Some(-32700), Some("Parse error")),
        ),
        (
            "InvalidRequestError".to_string(),
            envelope(Some(-32600), Some("Invalid Request")),
        ),
        (
            "MethodNotFoundError".to_string(),
            envelope(Some(-32601), Some("Method not found")),
        ),
        (
            "InvalidParamsError".to_string(),
            envelope(Some(-32602), Some("Invalid params")),
        ),
        (
            "InternalError".to_string(),
            envelope(Some(-32603), Some("Internal error")),
        ),
    ])
}
