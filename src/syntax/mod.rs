//! Parsing entry points.
//!
//! Each returns an AST whose expressions have not yet been checked against
//! declared types; call `typecheck` before reading inferred types. Errors come
//! back with the parsed text attached so they can render an excerpt.

use std::sync::Arc;

use crate::{
    ast::{Document, Expr, Task},
    WdlError,
};

pub mod meta;
pub mod parser;

pub use parser::Builder;

/// Parse a single expression.
pub fn parse_expr(text: &str) -> Result<Expr, WdlError> {
    Builder::new("<expr>")
        .expr(text)
        .map_err(|e| e.with_source(&Arc::from(text)))
}

/// Parse a single task.
pub fn parse_task(text: &str) -> Result<Task, WdlError> {
    Builder::new("<task>")
        .task(text)
        .map_err(|e| e.with_source(&Arc::from(text)))
}

/// Parse a document of zero or more tasks, positioned under `uri`.
pub fn parse_document(text: &str, uri: &str) -> Result<Document, WdlError> {
    Builder::new(uri)
        .document(text)
        .map_err(|e| e.with_source(&Arc::from(text)))
}
