//! Service model types.

use std::collections::BTreeMap;

use crate::transport::TransportOptions;

/// One service: the interface, its methods, its error taxonomy, and the
/// chosen transport configuration.
#[derive(Debug, Clone)]
pub struct ServiceModel {
    /// UpperCamel identifier derived from the trait name. The orchestrator
    /// prefixes the package name when two entry points would collide.
    pub id: String,
    pub trait_name: String,
    pub package: String,
    pub methods: Vec<MethodSpec>,
    pub transport: TransportOptions,
    pub logging: bool,
    pub instrumenting: Instrumenting,
    /// Error types reachable from any method, keyed by short type name.
    /// Feeds the single generated `error_decode` dispatch.
    pub map_code_errors: BTreeMap<String, ErrorSpec>,
}

impl ServiceModel {
    /// Prefix the id with the package name (used when ids are ambiguous
    /// across one generation run).
    pub fn qualify_with_package(&mut self) {
        use heck::ToUpperCamelCase;
        self.id = format!("{}{}", self.package.to_upper_camel_case(), self.id);
    }
}

/// Metrics middleware settings.
#[derive(Debug, Clone, Default)]
pub struct Instrumenting {
    pub enable: bool,
    pub namespace: String,
    pub subsystem: String,
}

/// One interface method, with context and error partitions stripped out.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub name: String,
    /// Lower-camel wire name (`get_all` → `getAll`).
    pub lc_name: String,
    /// The trait method's signature, verbatim; middleware impls re-emit it.
    pub sig: syn::Signature,
    pub is_async: bool,
    /// The leading context-like parameter, when present.
    pub ctx_param: Option<Param>,
    /// The `Err` type of a `Result` return, when present.
    pub err_result: Option<syn::Type>,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    /// Rust results are never named; retained for the model contract, and
    /// `results.len() <= 1` is enforced when false.
    pub results_named: bool,
    pub comments: Vec<String>,
    pub errors: Vec<ErrorSpec>,
}

impl MethodSpec {
    /// Whether the method has anything to decode into a request struct.
    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    /// Whether the method produces anything beyond its error.
    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }
}

/// A named parameter or result slot.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    /// Lower-camel wire name.
    pub lc_name: String,
    pub ty: syn::Type,
}

/// An error-carrying type: implements `Error` plus the transport's
/// status/error-code method returning a constant integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSpec {
    pub type_name: String,
    pub code: i64,
    /// Whether the code method was observed with a `&self` receiver.
    pub by_ref: bool,
}
