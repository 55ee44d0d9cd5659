//! Binding command-line inputs to a task's declarations.
//!
//! Inputs arrive as an inputs JSON object (`--input`), explicitly empty
//! arrays (`--empty`), and `NAME=VALUE` pairs, applied in that order. Values
//! become literal expressions attached with [`Decl::bind`]; the parsed task
//! is never modified.

use std::{fs, io};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ast::{Decl, Document, Expr, ExprKind, SourcePosition, StringPart, Task, Type, TypeKind};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("no such task {0} in document")]
    NoSuchTask(String),
    #[error("specify --task for WDL document with multiple tasks")]
    AmbiguousTask,
    #[error("empty WDL document")]
    EmptyDocument,
    #[error("invalid input name=value pair: {0}")]
    InvalidPair(String),
    #[error("no such input to {task}: {name}\n{help}")]
    NoSuchInput {
        task: String,
        name: String,
        help: String,
    },
    #[error("cannot set input {ty} {name} to empty array")]
    CannotBeEmpty { ty: Type, name: String },
    #[error("non-array input {name} duplicated\n{help}")]
    Duplicated { name: String, help: String },
    #[error("Boolean input should be true or false instead of {0}")]
    InvalidBoolean(String),
    #[error("invalid {ty} input {value}")]
    InvalidNumber { ty: Type, value: String },
    #[error("no command-line support for inputs of type {0}; specify it in JSON with --input")]
    Unsupported(Type),
    #[error("unable to load input JSON {origin}: {message}")]
    InputJson { origin: String, message: String },
    #[error("input JSON must be an object of input names to values")]
    NotAnObject,
    #[error("input JSON value for {ty} {name} has the wrong type: {value}")]
    InvalidJson {
        ty: Type,
        name: String,
        value: Value,
    },
    #[error("missing required inputs for {task}: {names}\n{help}")]
    MissingRequired {
        task: String,
        names: String,
        help: String,
    },
}

/// The task inputs apply to: the named one, or the only one.
pub fn resolve_target<'d>(doc: &'d Document, task: Option<&str>) -> Result<&'d Task, InputError> {
    match task {
        Some(name) => doc
            .task(name)
            .ok_or_else(|| InputError::NoSuchTask(name.to_string())),
        None => match doc.tasks.as_slice() {
            [] => Err(InputError::EmptyDocument),
            [only] => Ok(only),
            _ => Err(InputError::AmbiguousTask),
        },
    }
}

fn cli_pos(text: &str) -> SourcePosition {
    let width = text.chars().count().max(1);
    SourcePosition::new("<command line>", 1, 1, 1, width + 1)
}

/// String literal holding `text` verbatim.
fn string_literal(text: &str) -> ExprKind {
    let raw = text.replace('\\', "\\\\").replace('"', "\\\"");
    ExprKind::String(vec![StringPart::Text(raw)])
}

/// Literal expression for the right-hand side of `NAME=VALUE`, given the
/// declared type. Array types yield a one-element array; repeats append.
pub fn input_value(text: &str, ty: &Type) -> Result<Expr, InputError> {
    let pos = cli_pos(text);
    let kind = match ty.kind() {
        TypeKind::String | TypeKind::File => string_literal(text),
        TypeKind::Boolean => match text {
            "true" => ExprKind::Boolean(true),
            "false" => ExprKind::Boolean(false),
            _ => return Err(InputError::InvalidBoolean(text.to_string())),
        },
        TypeKind::Int => ExprKind::Int(text.parse().map_err(|_| InputError::InvalidNumber {
            ty: ty.clone(),
            value: text.to_string(),
        })?),
        TypeKind::Float => ExprKind::Float(text.parse().map_err(|_| InputError::InvalidNumber {
            ty: ty.clone(),
            value: text.to_string(),
        })?),
        TypeKind::Array(item)
            if matches!(
                item.kind(),
                TypeKind::String | TypeKind::File | TypeKind::Int | TypeKind::Float
            ) =>
        {
            ExprKind::Array(vec![input_value(text, item)?])
        }
        _ => return Err(InputError::Unsupported(ty.clone())),
    };
    Ok(Expr::new(pos, kind))
}

/// Load an inputs JSON object: inline text when `arg` starts with `{`,
/// standard input for `-`, otherwise a file path.
pub fn read_input_json(arg: &str) -> Result<Map<String, Value>, InputError> {
    let arg = arg.trim();
    let failed = |message: String| InputError::InputJson {
        origin: arg.to_string(),
        message,
    };
    let value: Value = if arg.starts_with('{') {
        serde_json::from_str(arg).map_err(|e| failed(e.to_string()))?
    } else if arg == "-" {
        serde_json::from_reader(io::stdin().lock()).map_err(|e| failed(e.to_string()))?
    } else {
        let text = fs::read_to_string(arg).map_err(|e| failed(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| failed(e.to_string()))?
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(InputError::NotAnObject),
    }
}

/// Literal expression for a JSON value of the declared type, or `None` when
/// the value does not fit the type.
pub fn json_value(value: &Value, ty: &Type) -> Option<Expr> {
    let kind = match (ty.kind(), value) {
        (TypeKind::Boolean, Value::Bool(b)) => ExprKind::Boolean(*b),
        (TypeKind::Int, Value::Number(n)) => ExprKind::Int(n.as_i64()?),
        (TypeKind::Float, Value::Number(n)) => ExprKind::Float(n.as_f64()?),
        (TypeKind::String | TypeKind::File, Value::String(text)) => string_literal(text),
        (TypeKind::Array(item), Value::Array(values)) => ExprKind::Array(
            values
                .iter()
                .map(|v| json_value(v, item))
                .collect::<Option<Vec<_>>>()?,
        ),
        _ => return None,
    };
    Some(Expr::new(cli_pos(&value.to_string()), kind))
}

/// Bind inputs JSON, `--empty NAME` arrays, and `NAME=VALUE` pairs to
/// `task`'s inputs. JSON keys may carry the `TASK.` prefix.
///
/// An explicitly empty array is refused for non-array and nonempty (`+`)
/// declarations; the `+` quantifier is enforced here, against the concrete
/// value, not by the type checker. Returns the bound declarations in the
/// order they were first given.
pub fn bind_inputs(
    task: &Task,
    json: &Map<String, Value>,
    pairs: &[String],
    empty: &[String],
) -> Result<Vec<Decl>, InputError> {
    let no_such_input = |name: &str| InputError::NoSuchInput {
        task: task.name.clone(),
        name: name.to_string(),
        help: task.input_help(),
    };
    let mut bound: IndexMap<String, Decl> = IndexMap::new();

    let prefix = format!("{}.", task.name);
    for (key, value) in json {
        let name = key.strip_prefix(prefix.as_str()).unwrap_or(key);
        let decl = task.input(name).ok_or_else(|| no_such_input(name))?;
        let expr = json_value(value, &decl.ty).ok_or_else(|| InputError::InvalidJson {
            ty: decl.ty.clone(),
            name: decl.name.clone(),
            value: value.clone(),
        })?;
        bound.insert(name.to_string(), decl.bind(expr));
    }

    for name in empty {
        let decl = task.input(name).ok_or_else(|| no_such_input(name))?;
        if !decl.ty.is_array() || decl.ty.nonempty() {
            return Err(InputError::CannotBeEmpty {
                ty: decl.ty.clone(),
                name: decl.name.clone(),
            });
        }
        let value = Expr::new(cli_pos("[]"), ExprKind::Array(vec![]));
        bound.insert(name.clone(), decl.bind(value));
    }

    for pair in pairs {
        let (name, text) = match pair.split_once('=') {
            Some((name, text)) if name.starts_with(|c: char| c.is_ascii_alphabetic()) => (name, text),
            _ => return Err(InputError::InvalidPair(pair.clone())),
        };
        let decl = task.input(name).ok_or_else(|| no_such_input(name))?;
        let value = input_value(text, &decl.ty)?;

        let Some(existing) = bound.get_mut(name) else {
            bound.insert(name.to_string(), decl.bind(value));
            continue;
        };
        let merged = match (existing.expr.as_ref().map(|e| &e.kind), &value.kind) {
            (Some(ExprKind::Array(old)), ExprKind::Array(new)) => {
                let items = old.iter().chain(new).cloned().collect();
                Expr::new(value.pos.clone(), ExprKind::Array(items))
            }
            _ => {
                return Err(InputError::Duplicated {
                    name: name.to_string(),
                    help: task.input_help(),
                })
            }
        };
        *existing = decl.bind(merged);
    }

    let missing: Vec<&str> = task
        .required_inputs()
        .into_iter()
        .filter(|d| !bound.contains_key(&d.name))
        .map(|d| d.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(InputError::MissingRequired {
            task: task.name.clone(),
            names: missing.join(", "),
            help: task.input_help(),
        });
    }

    Ok(bound.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_task;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Task {
        parse_task(
            "task t { input { Int n  Array[String] names  Array[Int]+ xs  Boolean? flag } command {} }",
        )
        .unwrap()
    }

    #[test]
    fn values_follow_declared_type() {
        assert_eq!(input_value("3", &Type::int()).unwrap().to_string(), "3");
        assert_eq!(input_value("2", &Type::float()).unwrap().to_string(), "2.0");
        assert_eq!(
            input_value("a\"b", &Type::string()).unwrap().to_string(),
            r#""a\"b""#
        );
        assert!(matches!(
            input_value("yes", &Type::boolean()),
            Err(InputError::InvalidBoolean(_))
        ));
        assert!(matches!(
            input_value("x", &Type::array(Type::boolean())),
            Err(InputError::Unsupported(_))
        ));
    }

    #[test]
    fn repeated_array_inputs_append() {
        let t = sample();
        let decls = bind_inputs(&t, &Map::new(), &strings(&["n=1", "xs=1", "xs=2", "names=a"]), &[]).unwrap();
        let rendered: Vec<String> = decls.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["Int n = 1", "Array[Int]+ xs = [1, 2]", "Array[String] names = [\"a\"]"]
        );
        assert!(t.input_decls().iter().all(|d| d.expr.is_none()));
    }

    #[test]
    fn repeated_scalar_input_fails() {
        let err = bind_inputs(&sample(), &Map::new(), &strings(&["n=1", "n=2", "xs=1"]), &[]).unwrap_err();
        assert!(matches!(err, InputError::Duplicated { .. }));
    }

    #[test]
    fn empty_array_respects_nonempty_quantifier() {
        let t = sample();
        let ok = bind_inputs(&t, &Map::new(), &strings(&["n=1", "xs=1"]), &strings(&["names"])).unwrap();
        assert!(ok.iter().any(|d| d.to_string() == "Array[String] names = []"));

        let err = bind_inputs(&t, &Map::new(), &strings(&["n=1"]), &strings(&["xs"])).unwrap_err();
        assert_eq!(err.to_string(), "cannot set input Array[Int]+ xs to empty array");
        let err = bind_inputs(&t, &Map::new(), &strings(&["xs=1"]), &strings(&["n"])).unwrap_err();
        assert!(matches!(err, InputError::CannotBeEmpty { .. }));
    }

    #[test]
    fn missing_required_lists_names_and_help() {
        let err = bind_inputs(&sample(), &Map::new(), &[], &[]).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("missing required inputs for t: n, names, xs"));
        assert!(message.contains("optional inputs:\n  Boolean? flag"));
    }

    #[test]
    fn json_inputs_bind_before_pairs() {
        let t = sample();
        let json = read_input_json(r#"{"t.n": 2, "xs": [1, 2], "flag": true}"#).unwrap();
        let decls = bind_inputs(&t, &json, &strings(&["xs=3", "names=a"]), &[]).unwrap();
        let rendered: Vec<String> = decls.iter().map(|d| d.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "Int n = 2",
                "Array[Int]+ xs = [1, 2, 3]",
                "Boolean? flag = true",
                "Array[String] names = [\"a\"]"
            ]
        );

        let err = bind_inputs(&t, &json, &strings(&["n=3", "names=a"]), &[]).unwrap_err();
        assert!(matches!(err, InputError::Duplicated { .. }));
    }

    #[test]
    fn json_values_must_fit_declared_type() {
        let nested = Type::array(Type::array(Type::boolean()));
        let expr = json_value(&serde_json::json!([[true], []]), &nested).unwrap();
        assert_eq!(expr.to_string(), "[[true], []]");
        assert!(json_value(&serde_json::json!(1.5), &Type::int()).is_none());
        assert_eq!(
            json_value(&serde_json::json!("a\"b"), &Type::file()).unwrap().to_string(),
            r#""a\"b""#
        );

        let json = read_input_json(r#"{"n": "three"}"#).unwrap();
        let err = bind_inputs(&sample(), &json, &[], &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "input JSON value for Int n has the wrong type: \"three\""
        );
        assert!(matches!(read_input_json("[1]"), Err(InputError::NotAnObject)));
        assert!(matches!(
            read_input_json("/nonexistent/inputs.json"),
            Err(InputError::InputJson { .. })
        ));
    }

    #[test]
    fn command_line_positions_are_never_empty() {
        let pos = cli_pos("");
        assert!(pos.end_column > pos.column);
        assert_eq!(cli_pos("abc").end_column, 4);
    }

    #[test]
    fn unknown_input_and_bad_pair() {
        let t = sample();
        assert!(matches!(
            bind_inputs(&t, &Map::new(), &strings(&["nope=1"]), &[]),
            Err(InputError::NoSuchInput { .. })
        ));
        assert!(matches!(
            bind_inputs(&t, &Map::new(), &strings(&["novalue"]), &[]),
            Err(InputError::InvalidPair(_))
        ));
    }

    #[test]
    fn target_resolution() {
        let doc = crate::parse_document("task a { command {} } task b { command {} }", "d").unwrap();
        assert!(matches!(resolve_target(&doc, None), Err(InputError::AmbiguousTask)));
        assert_eq!(resolve_target(&doc, Some("b")).unwrap().name, "b");
        assert!(matches!(
            resolve_target(&doc, Some("c")),
            Err(InputError::NoSuchTask(_))
        ));
    }
}
