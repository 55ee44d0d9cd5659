//! Persistent name-to-type bindings threaded through type checking.

use im::Vector;

use crate::ast::Type;

/// Append-only chain of `(name, type)` bindings.
///
/// `bind` never touches the receiver; it returns a new environment whose
/// newest binding shadows any older binding of the same name. Scoping is
/// done by choosing which environment to extend.
///
/// # Examples
///
/// ```rust
/// use wdlcheck::ast::{Type, TypeEnv};
/// let outer = TypeEnv::new().bind("x", Type::int());
/// let inner = outer.bind("x", Type::string());
/// assert_eq!(inner.resolve("x"), Some(&Type::string()));
/// assert_eq!(outer.resolve("x"), Some(&Type::int()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    bindings: Vector<(String, Type)>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, name: impl Into<String>, ty: Type) -> TypeEnv {
        let mut bindings = self.bindings.clone();
        bindings.push_front((name.into(), ty));
        TypeEnv { bindings }
    }

    /// Most recent binding of `name`.
    pub fn resolve(&self, name: &str) -> Option<&Type> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, ty)| ty)
    }

    /// Bindings from newest to oldest, shadowed ones included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.bindings.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
