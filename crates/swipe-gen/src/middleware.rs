//! Logging and instrumenting middleware decorators.
//!
//! Each middleware is a struct holding the next implementation and an
//! impl of the service trait that re-emits every method signature
//! verbatim. Logging records the method, duration, arguments (scalars
//! verbatim, slices by length), and the error flag; instrumenting records
//! a request counter and a latency histogram tagged by method.

use heck::ToUpperCamelCase;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use swipe_model::{MethodSpec, ServiceModel};

use crate::convert::{is_scalar, is_slice_like};
use crate::writer::SourceWriter;

/// The middleware wrapping statements for router assembly.
pub(crate) fn router_wraps(model: &ServiceModel) -> TokenStream {
    let mut wraps = TokenStream::new();
    if model.logging {
        let mw = logging_ident(model);
        wraps.extend(quote! { let svc = #mw { next: svc }; });
    }
    if model.instrumenting.enable {
        let mw = instrumenting_ident(model);
        wraps.extend(quote! { let svc = #mw { next: svc }; });
    }
    wraps
}

fn logging_ident(model: &ServiceModel) -> proc_macro2::Ident {
    format_ident!("{}LoggingMiddleware", model.id.to_upper_camel_case())
}

fn instrumenting_ident(model: &ServiceModel) -> proc_macro2::Ident {
    format_ident!("{}InstrumentingMiddleware", model.id.to_upper_camel_case())
}

fn forward_call(m: &MethodSpec) -> TokenStream {
    let method = format_ident!("{}", m.name);
    let mut args = Vec::new();
    if let Some(ctx) = &m.ctx_param {
        args.push(format_ident!("{}", ctx.name));
    }
    for p in &m.params {
        args.push(format_ident!("{}", p.name));
    }
    let call = quote! { self.next.#method(#(#args),*) };
    if m.is_async {
        quote! { #call.await }
    } else {
        call
    }
}

pub(crate) fn emit_logging(w: &mut SourceWriter, model: &ServiceModel) {
    let tracing = format_ident!("{}", w.import("tracing", "tracing"));
    let mw = logging_ident(model);
    let trait_ident = format_ident!("{}", model.trait_name);

    let methods = model.methods.iter().map(|m| {
        let sig = &m.sig;
        let name_str = &m.name;
        let call = forward_call(m);

        // Capture loggable views before the arguments move into the call.
        let mut captures = Vec::new();
        let mut fields = Vec::new();
        for p in &m.params {
            let ident = format_ident!("{}", p.name);
            if is_scalar(&p.ty) {
                let capture = format_ident!("{}_log", p.name);
                captures.push(quote! { let #capture = format!("{}", #ident); });
                fields.push(quote! { #ident = %#capture });
            } else if is_slice_like(&p.ty) {
                let capture = format_ident!("{}_len", p.name);
                captures.push(quote! { let #capture = #ident.len(); });
                fields.push(quote! { #capture });
            }
        }
        if m.err_result.is_some() {
            fields.push(quote! { err = out.is_err() });
        }

        quote! {
            #sig {
                #(#captures)*
                let started = std::time::Instant::now();
                let out = #call;
                #tracing::info!(method = #name_str, took = ?started.elapsed() #(, #fields)*);
                out
            }
        }
    });

    let methods: Vec<TokenStream> = methods.collect();
    w.write(quote! {
        #[derive(Debug, Clone)]
        pub struct #mw<S> {
            pub next: S,
        }

        impl<S> #trait_ident for #mw<S>
        where
            S: #trait_ident + Send + Sync,
        {
            #(#methods)*
        }
    });
}

pub(crate) fn emit_instrumenting(w: &mut SourceWriter, model: &ServiceModel) {
    let metrics = format_ident!("{}", w.import("metrics", "metrics"));
    let mw = instrumenting_ident(model);
    let trait_ident = format_ident!("{}", model.trait_name);
    let namespace = model.instrumenting.namespace.clone();
    let subsystem = model.instrumenting.subsystem.clone();

    let methods = model.methods.iter().map(|m| {
        let sig = &m.sig;
        let name_str = &m.name;
        let call = forward_call(m);
        quote! {
            #sig {
                let started = std::time::Instant::now();
                let out = #call;
                #metrics::counter!(
                    "request_count",
                    "namespace" => #namespace,
                    "subsystem" => #subsystem,
                    "method" => #name_str
                )
                .increment(1);
                #metrics::histogram!(
                    "request_latency_microseconds",
                    "namespace" => #namespace,
                    "subsystem" => #subsystem,
                    "method" => #name_str
                )
                .record(started.elapsed().as_micros() as f64);
                out
            }
        }
    });

    let methods: Vec<TokenStream> = methods.collect();
    w.write(quote! {
        #[derive(Debug, Clone)]
        pub struct #mw<S> {
            pub next: S,
        }

        impl<S> #trait_ident for #mw<S>
        where
            S: #trait_ident + Send + Sync,
        {
            #(#methods)*
        }
    });
}
