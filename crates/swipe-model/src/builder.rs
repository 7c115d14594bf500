//! Model construction from option trees.

use std::collections::BTreeSet;

use heck::{ToLowerCamelCase, ToUpperCamelCase};
use syn::{FnArg, Pat, ReturnType, Type};

use swipe_parse::{
    BlockReturns, ObjectHash, OptionNode, Position, ProgramIndex, ReturnResult, extract_docs,
    extract_result_types, hash_object, is_context_type, is_unit_type, must_option,
    path_last_segment,
};

use crate::config::walk_config;
use crate::service::{ErrorSpec, Instrumenting, MethodSpec, Param, ServiceModel};
use crate::transport::{TransportOptions, parse_transport};
use crate::{ConfigModel, ModelError};

/// Build the service model for one `service(...)` entry point.
pub fn build_service(
    index: &ProgramIndex,
    opt: &OptionNode,
) -> Result<ServiceModel, ModelError> {
    let iface_opt = must_option(opt, "iface")?;
    let iface_path = iface_opt.path_value()?;
    let trait_name = path_last_segment(iface_path).ok_or_else(|| ModelError::NotATrait {
        found: "an empty path".to_string(),
        position: iface_opt.position.clone(),
    })?;
    let trait_decl = index
        .trait_decl(&trait_name)
        .ok_or_else(|| ModelError::NotATrait {
            found: trait_name.clone(),
            position: iface_opt.position.clone(),
        })?;

    let transport = match opt.at("transport") {
        Some(transport_opt) => parse_transport(transport_opt)?,
        None => TransportOptions {
            prefix: "REST".to_string(),
            ..Default::default()
        },
    };

    let code_method = if transport.json_rpc.enable {
        "error_code"
    } else {
        "status_code"
    };

    let mut model = ServiceModel {
        id: trait_name.to_upper_camel_case(),
        trait_name: trait_name.clone(),
        package: trait_decl.package.clone(),
        methods: Vec::new(),
        transport,
        logging: opt.has("logging"),
        instrumenting: parse_instrumenting(opt)?,
        map_code_errors: Default::default(),
    };

    for method in trait_decl.methods() {
        let spec = build_method(
            index,
            &trait_name,
            method,
            code_method,
            &iface_opt.position,
        )?;
        for error in &spec.errors {
            model
                .map_code_errors
                .insert(error.type_name.clone(), error.clone());
        }
        model.methods.push(spec);
    }

    Ok(model)
}

fn parse_instrumenting(opt: &OptionNode) -> Result<Instrumenting, ModelError> {
    let mut instrumenting = Instrumenting::default();
    if let Some(inst) = opt.at("instrumenting") {
        instrumenting.enable = true;
        if let Some(namespace) = inst.at("namespace") {
            instrumenting.namespace = namespace.str_value()?.to_string();
        }
        if let Some(subsystem) = inst.at("subsystem") {
            instrumenting.subsystem = subsystem.str_value()?.to_string();
        }
    }
    Ok(instrumenting)
}

fn build_method(
    index: &ProgramIndex,
    trait_name: &str,
    method: &syn::TraitItemFn,
    code_method: &str,
    position: &Position,
) -> Result<MethodSpec, ModelError> {
    let name = method.sig.ident.to_string();
    let mut spec = MethodSpec {
        lc_name: name.to_lower_camel_case(),
        name,
        sig: method.sig.clone(),
        is_async: method.sig.asyncness.is_some(),
        ctx_param: None,
        err_result: None,
        params: Vec::new(),
        results: Vec::new(),
        results_named: false,
        comments: extract_docs(&method.attrs),
        errors: Vec::new(),
    };

    for (i, input) in method
        .sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(typed) => Some(typed),
            FnArg::Receiver(_) => None,
        })
        .enumerate()
    {
        let param_name = match input.pat.as_ref() {
            Pat::Ident(ident) => ident.ident.to_string(),
            _ => format!("arg{i}"),
        };
        let param = Param {
            lc_name: param_name.to_lower_camel_case(),
            name: param_name,
            ty: (*input.ty).clone(),
        };
        if i == 0 && is_context_type(&param.ty) {
            spec.ctx_param = Some(param);
        } else {
            spec.params.push(param);
        }
    }

    if let ReturnType::Type(_, ty) = &method.sig.output {
        let value_ty = match extract_result_types(ty) {
            Some((ok, err)) => {
                spec.err_result = Some(err);
                ok
            }
            None => (**ty).clone(),
        };
        if !is_unit_type(&value_ty) {
            if let Type::Tuple(tuple) = &value_ty {
                if tuple.elems.len() > 1 {
                    return Err(ModelError::UnnamedMultiResult {
                        method: spec.name,
                        position: position.clone(),
                    });
                }
                if let Some(elem) = tuple.elems.first() {
                    spec.results.push(data_result(elem.clone()));
                }
            } else {
                spec.results.push(data_result(value_ty));
            }
        }
    }

    spec.errors = collect_errors(index, trait_name, &spec.name, code_method);
    Ok(spec)
}

fn data_result(ty: Type) -> Param {
    Param {
        name: "data".to_string(),
        lc_name: "data".to_string(),
        ty,
    }
}

/// Error types reachable from any implementation of the given trait
/// method, through nested control flow and interface dispatch.
fn collect_errors(
    index: &ProgramIndex,
    trait_name: &str,
    method: &str,
    code_method: &str,
) -> Vec<ErrorSpec> {
    let mut out: Vec<ErrorSpec> = Vec::new();
    let mut visited: BTreeSet<ObjectHash> = BTreeSet::new();
    visited.insert(hash_object(trait_name, method));
    for imp in index.implementations(trait_name, method) {
        collect_error_returns(index, &imp.returns, code_method, &mut visited, &mut out);
    }
    out
}

fn collect_error_returns(
    index: &ProgramIndex,
    block: &BlockReturns,
    code_method: &str,
    visited: &mut BTreeSet<ObjectHash>,
    out: &mut Vec<ErrorSpec>,
) {
    for ret in block.all_returns() {
        for result in &ret.results {
            match result {
                ReturnResult::Value {
                    type_name: Some(type_name),
                    ..
                } => {
                    if out.iter().any(|e| &e.type_name == type_name) {
                        continue;
                    }
                    if let Some(spec) = error_spec(index, type_name, code_method) {
                        out.push(spec);
                    }
                }
                ReturnResult::Call { trait_name, method } => {
                    let key = hash_object(trait_name, method);
                    if !visited.insert(key) {
                        continue;
                    }
                    for imp in index.implementations(trait_name, method) {
                        collect_error_returns(index, &imp.returns, code_method, visited, out);
                    }
                }
                _ => {}
            }
        }
    }
}

fn error_spec(index: &ProgramIndex, type_name: &str, code_method: &str) -> Option<ErrorSpec> {
    if !index.is_error_like(type_name) {
        return None;
    }
    let method = index
        .methods_of(type_name)
        .into_iter()
        .find(|m| m.name == code_method)?;
    let codes = method.returns.int_returns();
    if codes.len() != 1 {
        tracing::warn!(
            error_type = type_name,
            method = code_method,
            "code method does not return a single integer constant; skipping"
        );
        return None;
    }
    Some(ErrorSpec {
        type_name: type_name.to_string(),
        code: codes[0],
        by_ref: method.receiver_by_ref,
    })
}

/// Build the configuration model for one `config_env` entry point.
pub fn build_config(index: &ProgramIndex, opt: &OptionNode) -> Result<ConfigModel, ModelError> {
    let init_expr = opt.expr_value()?;
    let struct_name =
        struct_name_of_expr(&init_expr).ok_or_else(|| ModelError::NotAStruct {
            found: "a non-struct expression".to_string(),
            position: opt.position.clone(),
        })?;
    let decl = index
        .type_decl(&struct_name)
        .ok_or_else(|| ModelError::NotAStruct {
            found: struct_name.clone(),
            position: opt.position.clone(),
        })?;
    let func_name = match opt.at("func_name") {
        Some(name) => name.str_value()?.to_string(),
        None => "load_config".to_string(),
    };
    Ok(ConfigModel {
        struct_name,
        init_expr,
        func_name,
        fields: walk_config(index, decl),
    })
}

fn struct_name_of_expr(expr: &syn::Expr) -> Option<String> {
    match expr {
        syn::Expr::Struct(expr_struct) => path_last_segment(&expr_struct.path),
        syn::Expr::Path(path) => path_last_segment(&path.path),
        syn::Expr::Call(call) => {
            if let syn::Expr::Path(func) = call.func.as_ref() {
                let segments: Vec<String> = func
                    .path
                    .segments
                    .iter()
                    .map(|s| s.ident.to_string())
                    .collect();
                // `AppConfig::default()` names the type before the
                // constructor segment.
                if segments.len() >= 2 {
                    return Some(segments[segments.len() - 2].clone());
                }
                segments.last().cloned()
            } else {
                None
            }
        }
        syn::Expr::Reference(reference) => struct_name_of_expr(&reference.expr),
        _ => None,
    }
}
