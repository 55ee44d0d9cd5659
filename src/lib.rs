//! Static front end for WDL task documents.
//!
//! Source text is parsed with a pest grammar into the document model in
//! [`ast`], then type-checked: every declaration and command is checked in
//! file order against the bindings visible before it. Errors are
//! [`WdlError`]s carrying the source position of the offending node.
//!
//! ```rust
//! use wdlcheck::{load_source, LoadOptions};
//! let doc = load_source(
//!     "task t { input { Int x } command { echo ${x} } output { Int y = x } }",
//!     "t.wdl",
//!     LoadOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(doc.tasks[0].outputs[0].to_string(), "Int y = x");
//! ```

pub mod ast;
pub mod cli;
pub mod diagnostics;
pub mod loader;
pub mod stdlib;
pub mod syntax;

pub use diagnostics::{ValidationKind, WdlError};
pub use loader::{load, load_all, load_source, LoadOptions};
pub use syntax::{parse_document, parse_expr, parse_task};
