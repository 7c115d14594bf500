//! The transport-neutral service model.
//!
//! Consumes the program index and an option tree and produces the model the
//! emitters work from: interface methods with their parameter and result
//! partitioning, the transitive error taxonomy, transport configuration,
//! and the flattened configuration-struct walk.

mod builder;
mod config;
mod error;
mod service;
mod transport;

pub use builder::{build_config, build_service};
pub use config::{ConfigField, ConfigModel};
pub use error::ModelError;
pub use service::{ErrorSpec, Instrumenting, MethodSpec, Param, ServiceModel};
pub use transport::{
    JsonRpcOptions, MarkdownOptions, MethodTransportOptions, OpenapiOptions, TransportOptions,
    brace_indices, parse_transport,
};
