//! Expression nodes and their static type resolution.
//!
//! Type resolution is two-phase. [`Expr::infer_type`] works out a node's
//! type bottom-up from the bindings in a [`TypeEnv`] and memoizes it;
//! [`Expr::typecheck`] then requires that type to coerce to an expected one.

use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::{
    ast::{SourcePosition, Type, TypeEnv},
    diagnostics::ValidationKind,
    stdlib::{self, Arg},
    WdlError,
};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// An expression node. Equality compares structure only: positions and
/// memoized types are ignored.
#[derive(Debug, Clone, Serialize)]
pub struct Expr {
    pub pos: SourcePosition,
    pub kind: ExprKind,
    #[serde(skip)]
    inferred: OnceCell<Type>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    Boolean(bool),
    Int(i64),
    Float(f64),
    /// Literal text (escapes kept as written) interleaved with placeholders.
    String(Vec<StringPart>),
    Array(Vec<Expr>),
    /// Function application; operators, negation, and indexing included.
    Apply {
        function: String,
        args: Vec<Expr>,
    },
    IfThenElse {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternative: Box<Expr>,
    },
    Ident(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StringPart {
    Text(String),
    Placeholder(Placeholder),
}

/// An interpolation `~{sep=", " expr}` inside a string or command.
#[derive(Debug, Clone, Serialize)]
pub struct Placeholder {
    pub pos: SourcePosition,
    pub options: IndexMap<String, String>,
    pub expr: Box<Expr>,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl PartialEq for Placeholder {
    fn eq(&self, other: &Self) -> bool {
        self.options == other.options && self.expr == other.expr
    }
}

// ============================================================================
// CONSTRUCTION & ACCESSORS
// ============================================================================

impl Expr {
    pub fn new(pos: SourcePosition, kind: ExprKind) -> Self {
        Self {
            pos,
            kind,
            inferred: OnceCell::new(),
        }
    }

    pub fn apply(pos: SourcePosition, function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            pos,
            ExprKind::Apply {
                function: function.into(),
                args,
            },
        )
    }

    /// Type memoized by an earlier `infer_type`, if any.
    pub fn inferred_type(&self) -> Option<&Type> {
        self.inferred.get()
    }

    /// Literal text of a string without placeholders.
    pub fn literal_text(&self) -> Option<String> {
        let ExprKind::String(parts) = &self.kind else {
            return None;
        };
        let mut text = String::new();
        for part in parts {
            match part {
                StringPart::Text(t) => text.push_str(t),
                StringPart::Placeholder(_) => return None,
            }
        }
        Some(text)
    }

    /// Whether the expression is made only of literals, so a consumer may
    /// treat a declaration bound to it as a default rather than a computation.
    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ExprKind::Boolean(_) | ExprKind::Int(_) | ExprKind::Float(_) => true,
            ExprKind::String(_) => self.literal_text().is_some(),
            ExprKind::Array(items) => items.iter().all(Expr::is_constant),
            ExprKind::Apply { function, args } if function == "_neg" => {
                matches!(args[..], [ref arg] if matches!(arg.kind, ExprKind::Int(_) | ExprKind::Float(_)))
            }
            _ => false,
        }
    }
}

// ============================================================================
// TYPE RESOLUTION
// ============================================================================

impl Expr {
    /// Resolve this expression's type using only the bindings in `env`.
    /// The first successful result is memoized and returned on later calls.
    pub fn infer_type(&self, env: &TypeEnv, check_quant: bool) -> Result<Type, WdlError> {
        if let Some(ty) = self.inferred.get() {
            return Ok(ty.clone());
        }
        let ty = self.resolve(env, check_quant)?;
        Ok(self.inferred.get_or_init(|| ty).clone())
    }

    /// Infer, then require the result to coerce to `expected`.
    pub fn typecheck(
        &self,
        expected: &Type,
        env: &TypeEnv,
        check_quant: bool,
    ) -> Result<(), WdlError> {
        let actual = self.infer_type(env, check_quant)?;
        if !actual.coerces(expected, check_quant) {
            return Err(WdlError::type_mismatch(expected, &actual, &self.pos));
        }
        Ok(())
    }

    fn resolve(&self, env: &TypeEnv, check_quant: bool) -> Result<Type, WdlError> {
        match &self.kind {
            ExprKind::Boolean(_) => Ok(Type::boolean()),
            ExprKind::Int(_) => Ok(Type::int()),
            ExprKind::Float(_) => Ok(Type::float()),
            ExprKind::String(parts) => {
                for part in parts {
                    if let StringPart::Placeholder(ph) = part {
                        ph.infer_type(env, check_quant)?;
                    }
                }
                Ok(Type::string())
            }
            ExprKind::Array(items) => {
                let mut item_type = Type::any();
                for item in items {
                    let ty = item.infer_type(env, check_quant)?;
                    item_type = Type::unify(&item_type, &ty, check_quant)
                        .ok_or_else(|| WdlError::type_mismatch(&item_type, &ty, &item.pos))?;
                }
                Ok(Type::array(item_type))
            }
            ExprKind::Apply { function, args } => {
                let Some(f) = stdlib::lookup(function) else {
                    return Err(WdlError::validation(
                        ValidationKind::NoSuchFunction {
                            name: function.clone(),
                        },
                        &self.pos,
                    ));
                };
                if f.arity != args.len() {
                    return Err(WdlError::validation(
                        ValidationKind::WrongArity {
                            function: function.clone(),
                            expected: f.arity,
                            actual: args.len(),
                        },
                        &self.pos,
                    ));
                }
                let typed = args
                    .iter()
                    .map(|arg| {
                        Ok(Arg {
                            ty: arg.infer_type(env, check_quant)?,
                            pos: &arg.pos,
                        })
                    })
                    .collect::<Result<Vec<_>, WdlError>>()?;
                (f.infer)(&typed, check_quant)
            }
            ExprKind::IfThenElse {
                condition,
                consequent,
                alternative,
            } => {
                condition.typecheck(&Type::boolean(), env, check_quant)?;
                let then_type = consequent.infer_type(env, check_quant)?;
                let else_type = alternative.infer_type(env, check_quant)?;
                Type::unify(&then_type, &else_type, check_quant).ok_or_else(|| {
                    WdlError::type_mismatch(&then_type, &else_type, &alternative.pos)
                })
            }
            ExprKind::Ident(parts) => {
                let name = parts.join(".");
                env.resolve(&name).cloned().ok_or_else(|| {
                    WdlError::validation(ValidationKind::UnknownIdentifier { name }, &self.pos)
                })
            }
        }
    }
}

impl Placeholder {
    /// A placeholder may interpolate any type; `sep` requires an array and
    /// `true`/`false` require a Boolean.
    pub fn infer_type(&self, env: &TypeEnv, check_quant: bool) -> Result<Type, WdlError> {
        let ty = self.expr.infer_type(env, check_quant)?;
        if self.options.contains_key("sep") && !ty.is_array() {
            return Err(WdlError::type_mismatch(
                &Type::array(Type::string()),
                &ty,
                &self.expr.pos,
            ));
        }
        if self.options.contains_key("true") || self.options.contains_key("false") {
            self.expr.typecheck(&Type::boolean(), env, check_quant)?;
        }
        Ok(Type::string())
    }
}

// ============================================================================
// SOURCE RENDERING
// ============================================================================

/// Binding strength of an expression when printed; higher binds tighter.
fn precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::IfThenElse { .. } => 0,
        ExprKind::Apply { function, args } => match (function.as_str(), args.len()) {
            ("_lor", 2) => 1,
            ("_land", 2) => 2,
            ("_eqeq" | "_neq" | "_lt" | "_lte" | "_gt" | "_gte", 2) => 3,
            ("_add" | "_sub", 2) => 4,
            ("_mul" | "_div" | "_rem", 2) => 5,
            ("_negate" | "_neg", 1) => 6,
            _ => 7,
        },
        _ => 7,
    }
}

fn infix(function: &str) -> Option<&'static str> {
    let op = match function {
        "_lor" => "||",
        "_land" => "&&",
        "_eqeq" => "==",
        "_neq" => "!=",
        "_lt" => "<",
        "_lte" => "<=",
        "_gt" => ">",
        "_gte" => ">=",
        "_add" => "+",
        "_sub" => "-",
        "_mul" => "*",
        "_div" => "/",
        "_rem" => "%",
        _ => return None,
    };
    Some(op)
}

/// Print `child`, parenthesized when it binds looser than `min`.
fn operand(f: &mut fmt::Formatter<'_>, child: &Expr, min: u8) -> fmt::Result {
    if precedence(child) < min {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

/// String text written between `"` delimiters. Parsed text is already in
/// double-quoted spelling; a bare `"` in a hand-built node gets escaped.
pub(crate) fn write_quoted_text(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let mut escaped = false;
    for c in text.chars() {
        if c == '"' && !escaped {
            write!(f, "\\")?;
        }
        escaped = c == '\\' && !escaped;
        write!(f, "{}", c)?;
    }
    Ok(())
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{{")?;
        for (name, value) in &self.options {
            write!(f, "{}=\"", name)?;
            write_quoted_text(f, value)?;
            write!(f, "\" ")?;
        }
        write!(f, "{}}}", self.expr)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Boolean(b) => write!(f, "{}", b),
            ExprKind::Int(i) => write!(f, "{}", i),
            ExprKind::Float(x) => write!(f, "{:?}", x),
            ExprKind::String(parts) => {
                write!(f, "\"")?;
                for part in parts {
                    match part {
                        StringPart::Text(text) => write_quoted_text(f, text)?,
                        StringPart::Placeholder(ph) => write!(f, "{}", ph)?,
                    }
                }
                write!(f, "\"")
            }
            ExprKind::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ExprKind::Apply { function, args } => {
                let prec = precedence(self);
                match (function.as_str(), &args[..]) {
                    (name, [lhs, rhs]) if infix(name).is_some() => {
                        operand(f, lhs, prec)?;
                        write!(f, " {} ", infix(name).unwrap_or_default())?;
                        operand(f, rhs, prec + 1)
                    }
                    ("_negate", [arg]) => {
                        write!(f, "!")?;
                        operand(f, arg, prec)
                    }
                    ("_neg", [arg]) => {
                        write!(f, "-")?;
                        operand(f, arg, prec)
                    }
                    ("_get", [array, index]) => {
                        operand(f, array, 7)?;
                        write!(f, "[{}]", index)
                    }
                    (name, args) => {
                        write!(f, "{}(", name)?;
                        for (i, arg) in args.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{}", arg)?;
                        }
                        write!(f, ")")
                    }
                }
            }
            ExprKind::IfThenElse {
                condition,
                consequent,
                alternative,
            } => write!(
                f,
                "if {} then {} else {}",
                condition, consequent, alternative
            ),
            ExprKind::Ident(parts) => write!(f, "{}", parts.join(".")),
        }
    }
}
