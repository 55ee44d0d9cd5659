//! WDL value types and the coercion relation used by static checking.
//!
//! A [`Type`] is a [`TypeKind`] plus two quantifier flags: `optional` (`?`)
//! and `nonempty` (`+`). The `nonempty` flag is only legal on arrays; that
//! rule is enforced once, by [`Type::quantified`], when a type is built.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::diagnostics::ValidationKind;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// The closed set of value types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Int,
    Float,
    Boolean,
    String,
    File,
    Array(Box<Type>),
    /// Item type of an empty array literal; resolved by the expected type.
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    kind: TypeKind,
    optional: bool,
    nonempty: bool,
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

impl Type {
    fn plain(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: false,
            nonempty: false,
        }
    }

    pub fn int() -> Self {
        Self::plain(TypeKind::Int)
    }

    pub fn float() -> Self {
        Self::plain(TypeKind::Float)
    }

    pub fn boolean() -> Self {
        Self::plain(TypeKind::Boolean)
    }

    pub fn string() -> Self {
        Self::plain(TypeKind::String)
    }

    pub fn file() -> Self {
        Self::plain(TypeKind::File)
    }

    pub fn any() -> Self {
        Self::plain(TypeKind::Any)
    }

    pub fn array(item: Type) -> Self {
        Self::plain(TypeKind::Array(Box::new(item)))
    }

    /// Apply quantifier flags. Fails with `IncompatibleOperand` when
    /// `nonempty` is requested on anything but an array.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wdlcheck::ast::Type;
    /// let xs = Type::array(Type::int()).quantified(false, true).unwrap();
    /// assert_eq!(xs.to_string(), "Array[Int]+");
    /// assert!(Type::int().quantified(false, true).is_err());
    /// ```
    pub fn quantified(self, optional: bool, nonempty: bool) -> Result<Type, ValidationKind> {
        if nonempty && !matches!(self.kind, TypeKind::Array(_)) {
            return Err(ValidationKind::IncompatibleOperand {
                message: format!("nonempty quantifier (+) on non-Array type {}", self),
            });
        }
        Ok(Type {
            optional,
            nonempty,
            ..self
        })
    }

    /// Same type with the optional flag replaced.
    pub fn with_optional(self, optional: bool) -> Type {
        Type { optional, ..self }
    }
}

// ============================================================================
// ACCESSORS
// ============================================================================

impl Type {
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn optional(&self) -> bool {
        self.optional
    }

    pub fn nonempty(&self) -> bool {
        self.nonempty
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, TypeKind::Int | TypeKind::Float)
    }

    pub fn as_array(&self) -> Option<&Type> {
        match &self.kind {
            TypeKind::Array(item) => Some(item),
            _ => None,
        }
    }

    /// Item type of an array.
    ///
    /// # Panics
    /// Calling this on a non-Array type is a programming error.
    pub fn item_type(&self) -> &Type {
        match &self.kind {
            TypeKind::Array(item) => item,
            _ => panic!("item_type() called on non-Array type {}", self),
        }
    }
}

// ============================================================================
// COERCION
// ============================================================================

impl Type {
    /// Whether a value of this type may be used where `target` is expected.
    ///
    /// With `check_quant == false` (relaxed mode) optional flags are ignored
    /// and a bare `T` coerces to `Array[T]`. The `nonempty` flag never takes
    /// part; consumers enforce it against concrete values.
    pub fn coerces(&self, target: &Type, check_quant: bool) -> bool {
        if check_quant && self.optional && !target.optional {
            return false;
        }
        match (&self.kind, &target.kind) {
            (TypeKind::Any, _) | (_, TypeKind::Any) => true,
            (TypeKind::Array(item), TypeKind::Array(target_item)) => {
                item.coerces(target_item, check_quant)
            }
            (_, TypeKind::Array(target_item)) if !check_quant => {
                self.coerces(target_item, check_quant)
            }
            (TypeKind::Int, TypeKind::Float) => true,
            (TypeKind::String, TypeKind::File) | (TypeKind::File, TypeKind::String) => true,
            (kind, target_kind) => kind == target_kind,
        }
    }

    /// Least type both `a` and `b` coerce to, if one of them is it.
    pub fn unify(a: &Type, b: &Type, check_quant: bool) -> Option<Type> {
        if a.coerces(b, check_quant) {
            return Some(b.clone());
        }
        if b.coerces(a, check_quant) {
            return Some(a.clone());
        }
        None
    }
}

// ============================================================================
// DISPLAY
// ============================================================================

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Int => write!(f, "Int")?,
            TypeKind::Float => write!(f, "Float")?,
            TypeKind::Boolean => write!(f, "Boolean")?,
            TypeKind::String => write!(f, "String")?,
            TypeKind::File => write!(f, "File")?,
            TypeKind::Any => write!(f, "Any")?,
            TypeKind::Array(item) => write!(f, "Array[{}]", item)?,
        }
        if self.nonempty {
            write!(f, "+")?;
        }
        if self.optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalars() -> Vec<Type> {
        vec![
            Type::int(),
            Type::float(),
            Type::boolean(),
            Type::string(),
            Type::file(),
        ]
    }

    #[test]
    fn coercion_is_reflexive() {
        for t in scalars() {
            assert!(t.coerces(&t, true), "{t}");
            let arr = Type::array(t.clone());
            assert!(arr.coerces(&arr, true), "{arr}");
            let opt = t.clone().with_optional(true);
            assert!(opt.coerces(&opt, true), "{opt}");
        }
    }

    #[test]
    fn numeric_widening_is_one_way() {
        assert!(Type::int().coerces(&Type::float(), true));
        assert!(!Type::float().coerces(&Type::int(), true));
        assert!(!Type::float().coerces(&Type::int(), false));
        assert!(!Type::boolean().coerces(&Type::int(), false));
    }

    #[test]
    fn scalar_to_array_only_when_relaxed() {
        for t in scalars() {
            let arr = Type::array(t.clone());
            assert!(t.coerces(&arr, false), "{t}");
            assert!(!t.coerces(&arr, true), "{t}");
            assert!(!arr.coerces(&t, false), "{arr}");
        }
    }

    #[test]
    fn optional_to_required_only_when_relaxed() {
        let opt = Type::string().with_optional(true);
        assert!(!opt.coerces(&Type::string(), true));
        assert!(opt.coerces(&Type::string(), false));
        assert!(Type::string().coerces(&opt, true));
    }

    #[test]
    fn nonempty_on_scalar_is_rejected() {
        for t in scalars() {
            let err = t.clone().quantified(false, true).unwrap_err();
            assert!(matches!(err, ValidationKind::IncompatibleOperand { .. }));
            assert!(t.quantified(true, false).is_ok());
        }
        assert!(Type::array(Type::int()).quantified(true, true).is_ok());
    }

    #[test]
    fn display_mirrors_declared_syntax() {
        let t = Type::array(Type::array(Type::string()))
            .quantified(true, true)
            .unwrap();
        assert_eq!(t.to_string(), "Array[Array[String]]+?");
        assert_eq!(Type::file().with_optional(true).to_string(), "File?");
    }

    #[test]
    fn unify_prefers_wider_type() {
        assert_eq!(
            Type::unify(&Type::int(), &Type::float(), true),
            Some(Type::float())
        );
        assert_eq!(
            Type::unify(&Type::float(), &Type::int(), true),
            Some(Type::float())
        );
        assert_eq!(Type::unify(&Type::int(), &Type::boolean(), true), None);
        let empty = Type::array(Type::any());
        let ints = Type::array(Type::int());
        assert_eq!(Type::unify(&empty, &ints, true), Some(ints));
    }

    #[test]
    #[should_panic]
    fn item_type_on_scalar_panics() {
        Type::int().item_type();
    }
}
