//! The option DSL.
//!
//! A generator entry point is a function whose body's first statement is an
//! expression statement calling an identifier named `build`. Its single
//! argument is an option tree: every option is a named call, terminals are
//! string literals, integer literals, path expressions, or arrays, and any
//! other expression is carried verbatim for the emitters.
//!
//! ```ignore
//! fn swipe_user_service() {
//!     build(service(
//!         iface(UserService),
//!         transport(protocol("http"), client_enable()),
//!     ));
//! }
//! ```

use std::path::Path;

use syn::{Expr, ItemFn, Lit, Stmt};

use crate::{ParseError, Position};

/// A parsed option: a name, a position, a typed value, and sub-options.
#[derive(Debug, Clone)]
pub struct OptionNode {
    pub name: String,
    pub position: Position,
    pub value: OptionValue,
    pub children: Vec<OptionNode>,
}

/// The typed value carried by an option.
#[derive(Debug, Clone)]
pub enum OptionValue {
    /// No value: the option is a switch.
    Unit,
    Str(String),
    Int(i64),
    Strings(Vec<String>),
    /// An identifier or selector expression, e.g. `UserService::get`.
    Path(syn::Path),
    Paths(Vec<syn::Path>),
    /// Any other expression, kept verbatim for emission.
    Expr(Box<Expr>),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            OptionValue::Unit => "a switch",
            OptionValue::Str(_) => "a string",
            OptionValue::Int(_) => "an integer",
            OptionValue::Strings(_) => "a string list",
            OptionValue::Path(_) => "a path expression",
            OptionValue::Paths(_) => "a path list",
            OptionValue::Expr(_) => "an expression",
        }
    }
}

impl OptionNode {
    /// The first sub-option with the given name.
    pub fn at(&self, name: &str) -> Option<&OptionNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// All sub-options with the given name, in source order.
    pub fn slice(&self, name: &str) -> Vec<&OptionNode> {
        self.children
            .iter()
            .filter(|child| child.name == name)
            .collect()
    }

    /// Whether a sub-option with the given name is present.
    pub fn has(&self, name: &str) -> bool {
        self.at(name).is_some()
    }

    pub fn str_value(&self) -> Result<&str, ParseError> {
        match &self.value {
            OptionValue::Str(s) => Ok(s),
            other => Err(self.kind_mismatch("a string", other)),
        }
    }

    pub fn int_value(&self) -> Result<i64, ParseError> {
        match &self.value {
            OptionValue::Int(v) => Ok(*v),
            other => Err(self.kind_mismatch("an integer", other)),
        }
    }

    pub fn strings(&self) -> Result<&[String], ParseError> {
        match &self.value {
            OptionValue::Strings(v) => Ok(v),
            other => Err(self.kind_mismatch("a string list", other)),
        }
    }

    pub fn path_value(&self) -> Result<&syn::Path, ParseError> {
        match &self.value {
            OptionValue::Path(p) => Ok(p),
            other => Err(self.kind_mismatch("a path expression", other)),
        }
    }

    pub fn paths(&self) -> Result<&[syn::Path], ParseError> {
        match &self.value {
            OptionValue::Paths(p) => Ok(p),
            other => Err(self.kind_mismatch("a path list", other)),
        }
    }

    /// The verbatim expression value; path values qualify as expressions too.
    pub fn expr_value(&self) -> Result<Expr, ParseError> {
        match &self.value {
            OptionValue::Expr(e) => Ok((**e).clone()),
            OptionValue::Path(p) => Ok(Expr::Path(syn::ExprPath {
                attrs: Vec::new(),
                qself: None,
                path: p.clone(),
            })),
            other => Err(self.kind_mismatch("an expression", other)),
        }
    }

    fn kind_mismatch(&self, expected: &'static str, found: &OptionValue) -> ParseError {
        ParseError::KindMismatch {
            name: self.name.clone(),
            expected,
            found: found.kind(),
            position: self.position.clone(),
        }
    }
}

/// Look up a required sub-option.
pub fn must_option<'a>(parent: &'a OptionNode, name: &str) -> Result<&'a OptionNode, ParseError> {
    parent.at(name).ok_or_else(|| ParseError::MissingOption {
        name: name.to_string(),
        position: parent.position.clone(),
    })
}

/// Find the `build(...)` call heading an entry-point function body and
/// return its single argument.
pub fn find_build_call(func: &ItemFn) -> Option<&Expr> {
    let first = func.block.stmts.first()?;
    let Stmt::Expr(Expr::Call(call), _) = first else {
        return None;
    };
    let Expr::Path(callee) = call.func.as_ref() else {
        return None;
    };
    if !callee.path.is_ident("build") {
        return None;
    }
    call.args.first()
}

/// Parse an option tree from the argument of a `build(...)` call.
pub fn parse_option(file: &Path, expr: &Expr) -> Result<OptionNode, ParseError> {
    let Expr::Call(call) = expr else {
        return Err(ParseError::Malformed {
            message: "the build argument must be an option call".to_string(),
            position: Position::new(file, expr_span(expr)),
        });
    };
    let Some(name) = option_name(&call.func) else {
        return Err(ParseError::Malformed {
            message: "option names must be plain snake_case identifiers".to_string(),
            position: Position::new(file, expr_span(expr)),
        });
    };

    let position = Position::new(file, expr_span(expr));
    let mut children = Vec::new();
    let mut strings = Vec::new();
    let mut value = OptionValue::Unit;

    for arg in &call.args {
        match arg {
            Expr::Call(child_call) if option_name(&child_call.func).is_some() => {
                children.push(parse_option(file, arg)?);
            }
            Expr::Lit(lit) => match &lit.lit {
                Lit::Str(s) => strings.push(s.value()),
                Lit::Int(i) => {
                    value = OptionValue::Int(i.base10_parse().map_err(|_| {
                        ParseError::Malformed {
                            message: "integer option value out of range".to_string(),
                            position: position.clone(),
                        }
                    })?);
                }
                _ => value = OptionValue::Expr(Box::new(arg.clone())),
            },
            Expr::Path(path) => value = OptionValue::Path(path.path.clone()),
            Expr::Array(_) | Expr::Reference(_) => {
                value = parse_array(file, arg, &name, &position)?;
            }
            other => value = OptionValue::Expr(Box::new(other.clone())),
        }
    }

    match strings.len() {
        0 => {}
        1 => value = OptionValue::Str(strings.remove(0)),
        _ => value = OptionValue::Strings(strings),
    }

    Ok(OptionNode {
        name,
        position,
        value,
        children,
    })
}

fn parse_array(
    file: &Path,
    expr: &Expr,
    name: &str,
    position: &Position,
) -> Result<OptionValue, ParseError> {
    let inner = match expr {
        Expr::Reference(reference) => reference.expr.as_ref(),
        other => other,
    };
    let Expr::Array(array) = inner else {
        return Ok(OptionValue::Expr(Box::new(expr.clone())));
    };

    let mut strings = Vec::new();
    let mut paths = Vec::new();
    for elem in &array.elems {
        match elem {
            Expr::Lit(lit) => {
                if let Lit::Str(s) = &lit.lit {
                    strings.push(s.value());
                }
            }
            Expr::Path(path) => paths.push(path.path.clone()),
            _ => {
                return Err(ParseError::KindMismatch {
                    name: name.to_string(),
                    expected: "a list of strings or paths",
                    found: "a mixed list",
                    position: position.clone(),
                });
            }
        }
    }
    if !strings.is_empty() && !paths.is_empty() {
        return Err(ParseError::KindMismatch {
            name: name.to_string(),
            expected: "a list of strings or paths",
            found: "a mixed list",
            position: position.clone(),
        });
    }
    if !paths.is_empty() {
        Ok(OptionValue::Paths(paths))
    } else {
        Ok(OptionValue::Strings(strings))
    }
}

/// A callee qualifies as an option name when it is a bare snake_case
/// identifier; anything else (`AppConfig::default`, closures, …) is an
/// expression value.
fn option_name(func: &Expr) -> Option<String> {
    let Expr::Path(path) = func else {
        return None;
    };
    if path.path.segments.len() != 1 {
        return None;
    }
    let ident = path.path.segments[0].ident.to_string();
    let mut chars = ident.chars();
    let first = chars.next()?;
    if !(first.is_lowercase() || first == '_') {
        return None;
    }
    ident
        .chars()
        .all(|c| c.is_lowercase() || c.is_ascii_digit() || c == '_')
        .then_some(ident)
}

fn expr_span(expr: &Expr) -> proc_macro2::Span {
    use syn::spanned::Spanned;
    expr.span()
}
