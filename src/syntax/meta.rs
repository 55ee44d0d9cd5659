//! Constant folding for `meta`, `parameter_meta`, and `runtime` values.
//!
//! Those sections are read statically by later tooling, so their literal
//! expressions are evaluated to plain JSON values as soon as they are parsed.

use serde_json::{Map, Number, Value};

use crate::{
    ast::{Expr, ExprKind, StringPart, TypeEnv},
    diagnostics::ValidationKind,
    WdlError,
};

pub type MetaValue = Value;
pub type MetaMap = Map<String, Value>;

/// Evaluate a literal expression. Anything that is not a literal, or a string
/// interpolating only literals, is rejected with `InvalidLiteral`.
pub fn fold(expr: &Expr) -> Result<MetaValue, WdlError> {
    expr.infer_type(&TypeEnv::new(), true)?;
    fold_literal(expr)
}

fn fold_literal(expr: &Expr) -> Result<MetaValue, WdlError> {
    match &expr.kind {
        ExprKind::Boolean(b) => Ok(Value::Bool(*b)),
        ExprKind::Int(i) => Ok(Value::from(*i)),
        ExprKind::Float(x) => float(*x, expr),
        ExprKind::String(parts) => {
            let mut text = String::new();
            for part in parts {
                match part {
                    StringPart::Text(raw) => text.push_str(&unescape(raw)),
                    StringPart::Placeholder(ph) => match fold_literal(&ph.expr)? {
                        Value::String(s) => text.push_str(&s),
                        scalar @ (Value::Bool(_) | Value::Number(_)) => {
                            text.push_str(&scalar.to_string())
                        }
                        _ => return Err(invalid(&ph.expr)),
                    },
                }
            }
            Ok(Value::String(text))
        }
        ExprKind::Array(items) => items
            .iter()
            .map(fold_literal)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ExprKind::Apply { function, args } if function == "_neg" && args.len() == 1 => {
            match &args[0].kind {
                ExprKind::Int(i) => Ok(Value::from(-*i)),
                ExprKind::Float(x) => float(-*x, expr),
                _ => Err(invalid(expr)),
            }
        }
        _ => Err(invalid(expr)),
    }
}

fn float(x: f64, expr: &Expr) -> Result<MetaValue, WdlError> {
    Number::from_f64(x)
        .map(Value::Number)
        .ok_or_else(|| invalid(expr))
}

fn invalid(expr: &Expr) -> WdlError {
    WdlError::validation(
        ValidationKind::InvalidLiteral {
            literal_type: "meta".into(),
            value: expr.to_string(),
        },
        &expr.pos,
    )
}

/// Decode backslash escapes in raw string text.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    _ => out.push_str("\\u"),
                }
            }
            Some(other @ ('\\' | '"' | '\'' | '/' | '$' | '~')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
