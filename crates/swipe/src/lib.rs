//! swipe — a source-code generator for service-oriented Rust.
//!
//! A service is described as a trait; a `build(...)` entry point carries
//! the option DSL selecting transports and settings. One run loads the
//! named packages, builds the service models, and emits REST and JSON-RPC
//! transports, OpenAPI documents, Markdown references, and configuration
//! loaders as `*_gen` files next to the sources they were derived from.
//!
//! ```ignore
//! fn swipe_user_service() {
//!     build(service(
//!         iface(UserService),
//!         transport(
//!             protocol("http"),
//!             client_enable(),
//!             method_options(
//!                 signature(UserService::get),
//!                 http_method("GET"),
//!                 path("/users/{id}"),
//!             ),
//!         ),
//!         logging(),
//!     ));
//! }
//! ```

mod orchestrator;
mod registry;

pub use orchestrator::{GenResult, Swipe};
pub use registry::{Processor, processor_for};

pub use swipe_gen::{
    ConfigGenerator, DocGenerator, Format, MarkdownGenerator, OpenapiGenerator, PrettyFormat,
    SourceGenerator, SourceWriter, TransportGenerator,
};
pub use swipe_model::{ConfigModel, ModelError, ServiceModel, build_config, build_service};
pub use swipe_openapi::OpenApi;
pub use swipe_parse::{
    LoadError, OptionNode, ParseError, Position, Program, ProgramIndex, find_build_call,
    parse_option,
};

/// The generator version stamped into every emitted banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
