//! Document object model for WDL tasks.
//!
//! Every node carries the [`SourcePosition`] it was parsed from. Nodes are
//! immutable once built; the only interior state is the type an expression
//! memoizes the first time [`Expr::infer_type`] succeeds.

pub mod decl;
pub mod env;
pub mod expr;
pub mod position;
pub mod types;

pub use decl::{Decl, Document, Task};
pub use env::TypeEnv;
pub use expr::{Expr, ExprKind, Placeholder, StringPart};
pub use position::SourcePosition;
pub use types::{Type, TypeKind};
