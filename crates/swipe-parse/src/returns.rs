//! Return-statement distillation.
//!
//! Method bodies are reduced to a tree of blocks and return statements,
//! walked over a sealed set of statement kinds (return, tail expression,
//! if/else, match, loop, while, for, nested blocks). Each returned
//! expression is classified as a value result (a named type the expression
//! constructs) or an interface-call result (a call dispatched through a
//! trait object or trait-bound generic), which the model builder expands
//! through the implementations of the called trait method.

use std::collections::BTreeMap;

use syn::{Block, Expr, Lit, Member, Stmt};

/// Returns gathered from one block, with nested blocks preserved.
#[derive(Debug, Clone, Default)]
pub struct BlockReturns {
    pub blocks: Vec<BlockReturns>,
    pub returns: Vec<ReturnStmt>,
}

/// A single return site and its result expressions.
#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub results: Vec<ReturnResult>,
}

/// Classification of one returned expression.
#[derive(Debug, Clone)]
pub enum ReturnResult {
    /// A value whose syntactic type could be named, e.g. `Err(ErrKind { .. })`,
    /// `ErrKind::new(..)`, or a bare integer literal.
    Value {
        type_name: Option<String>,
        int_value: Option<i64>,
    },
    /// `recv.method(..)` where the receiver's declared type is a trait.
    Call { trait_name: String, method: String },
}

/// Field-to-trait bindings in scope while walking one impl method.
#[derive(Debug, Clone, Default)]
pub struct ReturnScope {
    /// Field name → trait name, for fields holding `dyn Trait` (possibly
    /// behind `Box`/`Arc`/`Rc`/references) or a generic bound by the trait.
    pub fields: BTreeMap<String, String>,
}

impl BlockReturns {
    /// Every return statement in this block and all nested blocks.
    pub fn all_returns(&self) -> Vec<&ReturnStmt> {
        let mut out: Vec<&ReturnStmt> = self.returns.iter().collect();
        for block in &self.blocks {
            out.extend(block.all_returns());
        }
        out
    }

    /// The integer constants returned from this body, deduplicated in order.
    ///
    /// Used to read status/error codes: a code method qualifies only when
    /// this yields exactly one value.
    pub fn int_returns(&self) -> Vec<i64> {
        let mut out = Vec::new();
        for ret in self.all_returns() {
            for result in &ret.results {
                if let ReturnResult::Value {
                    int_value: Some(v), ..
                } = result
                    && !out.contains(v)
                {
                    out.push(*v);
                }
            }
        }
        out
    }
}

/// Walk a function body, collecting returns; the body's own tail expression
/// counts as a return.
pub fn collect_block_returns(block: &Block, scope: &ReturnScope) -> BlockReturns {
    collect_block(block, scope, true)
}

fn collect_block(block: &Block, scope: &ReturnScope, tail: bool) -> BlockReturns {
    let mut out = BlockReturns::default();
    let last = block.stmts.len().saturating_sub(1);
    for (i, stmt) in block.stmts.iter().enumerate() {
        match stmt {
            Stmt::Expr(expr, semi) => {
                let in_tail = tail && i == last && semi.is_none();
                walk_expr(expr, scope, in_tail, &mut out);
            }
            Stmt::Local(local) => {
                if let Some(init) = &local.init {
                    walk_expr(&init.expr, scope, false, &mut out);
                }
            }
            Stmt::Item(_) | Stmt::Macro(_) => {}
        }
    }
    out
}

fn walk_expr(expr: &Expr, scope: &ReturnScope, tail: bool, out: &mut BlockReturns) {
    match expr {
        Expr::Return(ret) => {
            out.returns.push(classify_return(ret.expr.as_deref(), scope));
        }
        Expr::If(expr_if) => {
            out.blocks
                .push(collect_block(&expr_if.then_branch, scope, tail));
            if let Some((_, else_branch)) = &expr_if.else_branch {
                let mut nested = BlockReturns::default();
                walk_expr(else_branch, scope, tail, &mut nested);
                out.blocks.push(nested);
            }
        }
        Expr::Match(expr_match) => {
            for arm in &expr_match.arms {
                let mut nested = BlockReturns::default();
                walk_expr(&arm.body, scope, tail, &mut nested);
                out.blocks.push(nested);
            }
        }
        Expr::Block(expr_block) => {
            out.blocks.push(collect_block(&expr_block.block, scope, tail));
        }
        Expr::Unsafe(expr_unsafe) => {
            out.blocks
                .push(collect_block(&expr_unsafe.block, scope, tail));
        }
        Expr::Loop(expr_loop) => {
            out.blocks.push(collect_block(&expr_loop.body, scope, false));
        }
        Expr::While(expr_while) => {
            out.blocks
                .push(collect_block(&expr_while.body, scope, false));
        }
        Expr::ForLoop(expr_for) => {
            out.blocks.push(collect_block(&expr_for.body, scope, false));
        }
        _ if tail => {
            out.returns.push(classify_return(Some(expr), scope));
        }
        _ => {}
    }
}

fn classify_return(expr: Option<&Expr>, scope: &ReturnScope) -> ReturnStmt {
    let mut results = Vec::new();
    if let Some(expr) = expr {
        if let Expr::Tuple(tuple) = expr {
            for elem in &tuple.elems {
                if let Some(result) = classify_result(elem, scope) {
                    results.push(result);
                }
            }
        } else if let Some(result) = classify_result(expr, scope) {
            results.push(result);
        }
    }
    ReturnStmt { results }
}

fn classify_result(expr: &Expr, scope: &ReturnScope) -> Option<ReturnResult> {
    match expr {
        Expr::Struct(expr_struct) => {
            let name = expr_struct.path.segments.last()?.ident.to_string();
            named_value(name)
        }
        Expr::Call(call) => {
            if let Expr::Path(func) = call.func.as_ref() {
                let segments: Vec<String> = func
                    .path
                    .segments
                    .iter()
                    .map(|seg| seg.ident.to_string())
                    .collect();
                let last = segments.last()?;
                if segments.len() == 1 && matches!(last.as_str(), "Ok" | "Err" | "Some") {
                    return classify_result(call.args.first()?, scope);
                }
                if segments.len() >= 2 {
                    let owner = &segments[segments.len() - 2];
                    if matches!(owner.as_str(), "Box" | "Arc" | "Rc") {
                        return classify_result(call.args.first()?, scope);
                    }
                    // `ErrKind::new(..)` names the type in the penultimate segment.
                    return named_value(owner.clone());
                }
            }
            None
        }
        Expr::MethodCall(method_call) => {
            if let Expr::Field(field) = method_call.receiver.as_ref()
                && matches!(field.base.as_ref(), Expr::Path(p) if p.path.is_ident("self"))
                && let Member::Named(name) = &field.member
                && let Some(trait_name) = scope.fields.get(&name.to_string())
            {
                return Some(ReturnResult::Call {
                    trait_name: trait_name.clone(),
                    method: method_call.method.to_string(),
                });
            }
            // Combinators like `ok_or(ErrKind {})` and `map_err(|_| ErrKind {})`
            // carry the error construction in an argument.
            for arg in &method_call.args {
                if let Some(result @ ReturnResult::Value {
                    type_name: Some(_), ..
                }) = classify_result(arg, scope)
                {
                    return Some(result);
                }
            }
            classify_result(&method_call.receiver, scope)
        }
        Expr::Closure(closure) => classify_result(&closure.body, scope),
        Expr::Path(path) => {
            let name = path.path.segments.last()?.ident.to_string();
            named_value(name)
        }
        Expr::Lit(lit) => {
            if let Lit::Int(int) = &lit.lit {
                return Some(ReturnResult::Value {
                    type_name: None,
                    int_value: int.base10_parse().ok(),
                });
            }
            None
        }
        Expr::Try(expr_try) => classify_result(&expr_try.expr, scope),
        Expr::Await(expr_await) => classify_result(&expr_await.base, scope),
        Expr::Reference(reference) => classify_result(&reference.expr, scope),
        Expr::Paren(paren) => classify_result(&paren.expr, scope),
        Expr::Cast(cast) => classify_result(&cast.expr, scope),
        Expr::Unary(unary) => {
            // `-32601` parses as a negated literal.
            if let Some(ReturnResult::Value {
                type_name,
                int_value: Some(v),
            }) = classify_result(&unary.expr, scope)
            {
                return Some(ReturnResult::Value {
                    type_name,
                    int_value: Some(-v),
                });
            }
            None
        }
        _ => None,
    }
}

fn named_value(name: String) -> Option<ReturnResult> {
    let first_upper = name.chars().next().is_some_and(char::is_uppercase);
    let all_caps = name.chars().all(|c| !c.is_lowercase());
    if first_upper && !all_caps {
        Some(ReturnResult::Value {
            type_name: Some(name),
            int_value: None,
        })
    } else {
        None
    }
}
