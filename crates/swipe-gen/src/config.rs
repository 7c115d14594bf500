//! Configuration loader emission.
//!
//! The generated loader reads environment variables first, parses flags
//! after all env reads, then checks required fields against their zero
//! values; a `Display` impl renders the human-readable dump.

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use swipe_model::{ConfigField, ConfigModel};

use crate::convert::{write_convert_type, zero_check};
use crate::writer::SourceWriter;
use crate::{EmitError, SourceGenerator};

pub struct ConfigGenerator {
    model: ConfigModel,
}

impl ConfigGenerator {
    pub fn new(model: ConfigModel) -> Self {
        Self { model }
    }
}

impl SourceGenerator for ConfigGenerator {
    fn filename(&self) -> String {
        "config_gen.rs".to_string()
    }

    fn generate(&self, w: &mut SourceWriter) -> Result<(), EmitError> {
        let model = &self.model;
        let struct_ident = format_ident!("{}", model.struct_name);
        let func_ident = format_ident!("{}", model.func_name);
        let func_name = &model.func_name;
        let init = &model.init_expr;
        let errs = format_ident!("errs");

        let env_fields: Vec<&ConfigField> =
            model.fields.iter().filter(|f| !f.is_flag).collect();
        let flag_fields: Vec<&ConfigField> =
            model.fields.iter().filter(|f| f.is_flag).collect();

        let env_reads = env_fields.iter().map(|f| {
            let name = &f.name;
            let access = field_access(&f.field_path);
            let convert = write_convert_type(
                access,
                quote! { value },
                &f.ty,
                Some(&errs),
                &format!("convert {name} error"),
            );
            quote! {
                if let Ok(value) = std::env::var(#name) {
                    #convert
                }
            }
        });
        let env_reads: Vec<TokenStream> = env_reads.collect();

        let flags = if flag_fields.is_empty() {
            quote! {}
        } else {
            let clap = format_ident!("{}", w.import("clap", "clap"));
            let args = flag_fields.iter().map(|f| {
                let name = &f.name;
                let desc = &f.desc;
                quote! {
                    .arg(#clap::Arg::new(#name).long(#name).help(#desc))
                }
            });
            let reads = flag_fields.iter().map(|f| {
                let name = &f.name;
                let access = field_access(&f.field_path);
                let convert = write_convert_type(
                    access,
                    quote! { value },
                    &f.ty,
                    Some(&errs),
                    &format!("convert {name} error"),
                );
                quote! {
                    if let Some(value) = matches.get_one::<String>(#name) {
                        #convert
                    }
                }
            });
            quote! {
                let matches = #clap::Command::new(#func_name)
                    #(#args)*
                    .ignore_errors(true)
                    .get_matches();
                #(#reads)*
            }
        };

        let required_checks = model.fields.iter().filter(|f| f.required).map(|f| {
            let access = field_access(&f.field_path);
            let check = zero_check(access, &f.ty);
            let message = format!(
                "{} {} required",
                if f.is_flag { "flag" } else { "env" },
                f.name
            );
            quote! {
                if #check {
                    #errs.push(#message.into());
                }
            }
        });
        let required_checks: Vec<TokenStream> = required_checks.collect();

        let dump_lines = model.fields.iter().map(|f| {
            let access = self_access(&f.field_path);
            let mut line = if f.is_flag {
                format!("--{} {{}}", f.name)
            } else {
                format!("{}={{}}", f.name)
            };
            if !f.desc.is_empty() {
                line.push_str(&format!(" ;{}", f.desc));
            }
            quote! {
                writeln!(f, #line, #access)?;
            }
        });
        let dump_lines: Vec<TokenStream> = dump_lines.collect();

        w.write(quote! {
            pub fn #func_ident() -> (#struct_ident, Vec<Box<dyn std::error::Error + Send + Sync>>) {
                let mut #errs: Vec<Box<dyn std::error::Error + Send + Sync>> = Vec::new();
                let mut cfg: #struct_ident = #init;
                #(#env_reads)*
                #flags
                #(#required_checks)*
                (cfg, #errs)
            }

            impl std::fmt::Display for #struct_ident {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    #(#dump_lines)*
                    Ok(())
                }
            }
        });
        Ok(())
    }
}

fn field_access(path: &str) -> TokenStream {
    let segments = path.split('.').map(|s| format_ident!("{}", s));
    quote! { cfg #(. #segments)* }
}

fn self_access(path: &str) -> TokenStream {
    let segments = path.split('.').map(|s| format_ident!("{}", s));
    quote! { self #(. #segments)* }
}
