//! Scalar conversions for emitted decoders.
//!
//! Path, query, header, and flag values arrive as strings; the emitted
//! code converts them into the request-struct field types. Parse failures
//! append to a caller-visible multi-error sink instead of aborting the
//! decode.

use proc_macro2::TokenStream;
use quote::quote;
use swipe_parse::type_short_name;
use syn::Type;

/// Emit the conversion of a string-typed `src` expression into `dst`.
///
/// Strings assign; everything else converts through `str::parse` with the
/// field's own type, so named wrappers inherit their base conversion via
/// `FromStr`. `Url` fields bind through `Url::parse`, re-wrapped when the
/// field holds the URL behind `Option`/`Box`/`Arc`. Slices of basics split
/// on commas and parse element-wise. With no sink, failures fall back to
/// leaving the default in place.
pub fn write_convert_type(
    dst: TokenStream,
    src: TokenStream,
    ty: &Type,
    sink: Option<&proc_macro2::Ident>,
    message: &str,
) -> TokenStream {
    if is_string(ty) {
        return quote! {
            #dst = #src.to_string();
        };
    }

    if let Some((inner, wrapper)) = url_field(ty) {
        let wrapped = match wrapper {
            UrlWrapper::Plain => quote! { parsed },
            UrlWrapper::Option => quote! { Some(parsed) },
            UrlWrapper::Box => quote! { Box::new(parsed) },
            UrlWrapper::Arc => quote! { std::sync::Arc::new(parsed) },
        };
        return match sink {
            Some(sink) => quote! {
                match <#inner>::parse(&#src) {
                    Ok(parsed) => #dst = #wrapped,
                    Err(_) => #sink.push(#message.into()),
                }
            },
            None => quote! {
                if let Ok(parsed) = <#inner>::parse(&#src) {
                    #dst = #wrapped;
                }
            },
        };
    }

    if let Some(elem) = vec_elem(ty) {
        let push_err = match sink {
            Some(sink) => quote! { #sink.push(#message.into()) },
            None => quote! { {} },
        };
        return quote! {
            for part in #src.split(',') {
                match part.trim().parse::<#elem>() {
                    Ok(value) => #dst.push(value),
                    Err(_) => #push_err,
                }
            }
        };
    }

    match sink {
        Some(sink) => quote! {
            match #src.parse::<#ty>() {
                Ok(value) => #dst = value,
                Err(_) => #sink.push(#message.into()),
            }
        },
        None => quote! {
            if let Ok(value) = #src.parse::<#ty>() {
                #dst = value;
            }
        },
    }
}

/// Emit a condition that is true when `target` holds its zero value.
///
/// `Url` has no zero value; a URL behind `Option` gates on presence, and a
/// bare (or boxed) URL checks for an empty rendering through the deref.
pub fn zero_check(target: TokenStream, ty: &Type) -> TokenStream {
    if let Some((_, wrapper)) = url_field(ty) {
        return match wrapper {
            UrlWrapper::Option => quote! { #target.is_none() },
            _ => quote! { #target.as_str().is_empty() },
        };
    }
    match type_short_name(ty).as_deref() {
        Some("String") | Some("str") => quote! { #target.is_empty() },
        Some("Vec") => quote! { #target.is_empty() },
        Some("Option") => quote! { #target.is_none() },
        Some("bool") => quote! { !#target },
        _ => quote! { #target == Default::default() },
    }
}

/// Whether a parameter type is a loggable scalar.
pub fn is_scalar(ty: &Type) -> bool {
    matches!(
        type_short_name(ty).as_deref(),
        Some(
            "String"
                | "str"
                | "bool"
                | "i8"
                | "i16"
                | "i32"
                | "i64"
                | "isize"
                | "u8"
                | "u16"
                | "u32"
                | "u64"
                | "usize"
                | "f32"
                | "f64"
        )
    )
}

/// Whether a parameter type is a slice-like collection.
pub fn is_slice_like(ty: &Type) -> bool {
    matches!(ty, Type::Slice(_) | Type::Array(_))
        || type_short_name(ty).as_deref() == Some("Vec")
}

fn is_string(ty: &Type) -> bool {
    matches!(type_short_name(ty).as_deref(), Some("String" | "str"))
}

enum UrlWrapper {
    Plain,
    Option,
    Box,
    Arc,
}

/// A `Url` leaf and the wrapper its field type holds it behind.
fn url_field(ty: &Type) -> Option<(Type, UrlWrapper)> {
    match type_short_name(ty)?.as_str() {
        "Url" => Some((ty.clone(), UrlWrapper::Plain)),
        name @ ("Option" | "Box" | "Arc") => {
            let inner = first_generic(ty)?;
            if type_short_name(&inner)? != "Url" {
                return None;
            }
            let wrapper = match name {
                "Option" => UrlWrapper::Option,
                "Box" => UrlWrapper::Box,
                _ => UrlWrapper::Arc,
            };
            Some((inner, wrapper))
        }
        _ => None,
    }
}

fn first_generic(ty: &Type) -> Option<Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && let syn::PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(syn::GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

fn vec_elem(ty: &Type) -> Option<Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == "Vec"
        && let syn::PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(syn::GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}
