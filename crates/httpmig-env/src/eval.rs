//! Evaluates a parsed template against an [`Env`].

use crate::ast::{Cond, FieldPath, Node, Operand, PrintExpr};
use crate::env::Env;

/// Resolve a [`FieldPath`] against `env`, with `current` bound as the
/// loop variable inside a `range` body. Undefined variables resolve to an
/// empty string rather than erroring, which is what makes optional values
/// possible.
fn resolve<'a>(field: &FieldPath, env: &'a Env, current: Option<&'a str>) -> &'a str {
    match field {
        FieldPath::Env(key) => env.lookup_env(key).unwrap_or(""),
        FieldPath::Auth(name) => env.lookup_auth(name).unwrap_or(""),
        FieldPath::Current => current.unwrap_or(""),
    }
}

fn resolve_operand<'a>(op: &'a Operand, env: &'a Env, current: Option<&'a str>) -> String {
    match op {
        Operand::Field(f) => resolve(f, env, current).to_string(),
        Operand::Literal(s) => s.clone(),
        Operand::Len(f) => resolve(f, env, current).chars().count().to_string(),
    }
}

fn eval_cond(cond: &Cond, env: &Env, current: Option<&str>) -> bool {
    match cond {
        Cond::Truthy(f) => !resolve(f, env, current).is_empty(),
        Cond::Eq(a, b) => resolve_operand(a, env, current) == resolve_operand(b, env, current),
        Cond::Ne(a, b) => resolve_operand(a, env, current) != resolve_operand(b, env, current),
    }
}

fn eval_print(expr: &PrintExpr, env: &Env, current: Option<&str>) -> String {
    match expr {
        PrintExpr::Field(f) => resolve(f, env, current).to_string(),
        PrintExpr::Len(f) => resolve(f, env, current).chars().count().to_string(),
        PrintExpr::Default(f, fallback) => {
            let v = resolve(f, env, current);
            if v.is_empty() {
                fallback.clone()
            } else {
                v.to_string()
            }
        }
    }
}

/// Render a parsed node sequence against `env`.
pub fn eval_nodes(nodes: &[Node], env: &Env, current: Option<&str>) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Print(expr) => out.push_str(&eval_print(expr, env, current)),
            Node::If { cond, then, els } => {
                if eval_cond(cond, env, current) {
                    out.push_str(&eval_nodes(then, env, current));
                } else if let Some(els) = els {
                    out.push_str(&eval_nodes(els, env, current));
                }
            }
            Node::Range { field, body } => {
                let value = resolve(field, env, current);
                for item in value.split(',').filter(|s| !s.is_empty()) {
                    out.push_str(&eval_nodes(body, env, Some(item)));
                }
            }
        }
    }
    out
}
