//! The processor registry: top-level option names form a closed
//! vocabulary, each routed to the pipeline that consumes it.

/// The pipelines an entry point can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    /// `service(...)`: transports, documents, middlewares.
    Service,
    /// `config_env(...)`: the typed configuration loader.
    ConfigEnv,
}

/// Resolve a top-level option name; `None` means the option is unknown.
pub fn processor_for(name: &str) -> Option<Processor> {
    match name {
        "service" => Some(Processor::Service),
        "config_env" => Some(Processor::ConfigEnv),
        _ => None,
    }
}
