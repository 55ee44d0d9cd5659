//! Declarations, tasks, and the document that holds them.

use std::{collections::HashSet, fmt};

use serde::Serialize;

use crate::{
    ast::{Expr, ExprKind, SourcePosition, StringPart, Type, TypeEnv},
    diagnostics::ValidationKind,
    syntax::meta::MetaMap,
    WdlError,
};

// ============================================================================
// DECL
// ============================================================================

/// A named, typed binding with an optional initializer.
///
/// `ty` already carries the quantifier flags, so `ty.to_string()` reproduces
/// the declared type exactly (`Array[Int]+`, `String?`).
#[derive(Debug, Clone, Serialize)]
pub struct Decl {
    pub pos: SourcePosition,
    #[serde(rename = "type")]
    pub ty: Type,
    pub name: String,
    pub optional: bool,
    pub nonempty: bool,
    pub expr: Option<Expr>,
}

impl Decl {
    /// Fails when `nonempty` is requested on a non-Array type.
    pub fn new(
        pos: SourcePosition,
        ty: Type,
        name: impl Into<String>,
        optional: bool,
        nonempty: bool,
        expr: Option<Expr>,
    ) -> Result<Decl, WdlError> {
        let ty = ty
            .quantified(optional, nonempty)
            .map_err(|kind| WdlError::validation(kind, &pos))?;
        Ok(Decl {
            pos,
            ty,
            name: name.into(),
            optional,
            nonempty,
            expr,
        })
    }

    /// Same declaration with `expr` as its initializer.
    pub fn bind(&self, expr: Expr) -> Decl {
        Decl {
            expr: Some(expr),
            ..self.clone()
        }
    }

    /// Check the initializer, if any, then extend `env` with this binding.
    fn typecheck(&self, env: TypeEnv, check_quant: bool) -> Result<TypeEnv, WdlError> {
        if let Some(expr) = &self.expr {
            expr.typecheck(&self.ty, &env, check_quant)?;
        }
        Ok(env.bind(self.name.clone(), self.ty.clone()))
    }
}

impl PartialEq for Decl {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.name == other.name && self.expr == other.expr
    }
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            Some(expr) => write!(f, "{} {} = {}", self.ty, self.name, expr),
            None => write!(f, "{} {}", self.ty, self.name),
        }
    }
}

// ============================================================================
// TASK
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub pos: SourcePosition,
    pub name: String,
    /// Declarations of the `input {}` section; `None` when the task has none.
    pub inputs: Option<Vec<Decl>>,
    /// Declarations between the inputs and the command.
    pub postinputs: Vec<Decl>,
    pub command: Expr,
    pub outputs: Vec<Decl>,
    pub parameter_meta: MetaMap,
    pub runtime: MetaMap,
    pub meta: MetaMap,
}

impl Task {
    /// Declarations of the `input {}` section, empty when it is absent.
    pub fn input_decls(&self) -> &[Decl] {
        self.inputs.as_deref().unwrap_or_default()
    }

    /// Type-check declarations, command, and outputs in file order.
    ///
    /// Inputs and postinputs fold left to right into one environment, so a
    /// declaration sees only those before it. The command is checked against
    /// that environment, and outputs continue to extend it. Returns the final
    /// environment.
    pub fn typecheck(&self, env: Option<&TypeEnv>, check_quant: bool) -> Result<TypeEnv, WdlError> {
        let mut env = env.cloned().unwrap_or_default();
        for decl in self.input_decls().iter().chain(&self.postinputs) {
            env = decl.typecheck(env, check_quant)?;
        }
        self.command.typecheck(&Type::string(), &env, check_quant)?;
        for decl in &self.outputs {
            env = decl.typecheck(env, check_quant)?;
        }
        Ok(env)
    }

    /// Declarations a caller may supply: the `input {}` section, or every
    /// declaration of an older task that has none.
    pub fn available_inputs(&self) -> Vec<&Decl> {
        match &self.inputs {
            Some(inputs) => inputs.iter().collect(),
            None => self.postinputs.iter().collect(),
        }
    }

    /// Available inputs with neither an initializer nor `?`.
    pub fn required_inputs(&self) -> Vec<&Decl> {
        self.available_inputs()
            .into_iter()
            .filter(|d| d.expr.is_none() && !d.ty.optional())
            .collect()
    }

    pub fn input(&self, name: &str) -> Option<&Decl> {
        self.available_inputs().into_iter().find(|d| d.name == name)
    }

    /// Input and output summary printed when a caller's inputs fall short.
    ///
    /// For a task without `input {}`, declarations bound to a computed
    /// expression are left out of the optional listing, though they can
    /// still be overridden.
    pub fn input_help(&self) -> String {
        let required = self.required_inputs();
        let mut lines = vec!["\nrequired inputs:".to_string()];
        lines.extend(required.iter().map(|d| format!("  {} {}", d.ty, d.name)));

        let optional: Vec<&Decl> = self
            .available_inputs()
            .into_iter()
            .filter(|d| !required.iter().any(|r| r.name == d.name))
            .filter(|d| {
                self.inputs.is_some() || d.expr.as_ref().map_or(true, Expr::is_constant)
            })
            .collect();
        if !optional.is_empty() {
            lines.push("\noptional inputs:".to_string());
            lines.extend(optional.iter().map(|d| format!("  {} {}", d.ty, d.name)));
        }

        lines.push("\noutputs:".to_string());
        lines.extend(self.outputs.iter().map(|d| format!("  {} {}", d.ty, d.name)));
        lines.join("\n")
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.inputs == other.inputs
            && self.postinputs == other.postinputs
            && self.command == other.command
            && self.outputs == other.outputs
            && self.parameter_meta == other.parameter_meta
            && self.runtime == other.runtime
            && self.meta == other.meta
    }
}

fn write_meta(f: &mut fmt::Formatter<'_>, section: &str, map: &MetaMap) -> fmt::Result {
    if map.is_empty() {
        return Ok(());
    }
    writeln!(f, "  {} {{", section)?;
    for (key, value) in map {
        let bare = key.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if bare {
            writeln!(f, "    {}: {}", key, value)?;
        } else {
            writeln!(f, "    {}: {}", serde_json::Value::from(key.as_str()), value)?;
        }
    }
    writeln!(f, "  }}")
}

/// Whether command text can sit between `<<<` and `>>>` unchanged. Text that
/// cannot only comes from a brace command, which braces reproduce.
fn fits_heredoc(parts: &[StringPart]) -> bool {
    let ends_in_angle = matches!(parts.last(), Some(StringPart::Text(t)) if t.ends_with('>'));
    !ends_in_angle
        && !parts
            .iter()
            .any(|part| matches!(part, StringPart::Text(t) if t.contains(">>>")))
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "task {} {{", self.name)?;
        if let Some(inputs) = &self.inputs {
            writeln!(f, "  input {{")?;
            for decl in inputs {
                writeln!(f, "    {}", decl)?;
            }
            writeln!(f, "  }}")?;
        }
        for decl in &self.postinputs {
            writeln!(f, "  {}", decl)?;
        }

        let parts = match &self.command.kind {
            ExprKind::String(parts) => parts.as_slice(),
            _ => &[],
        };
        let (open, close) = if fits_heredoc(parts) {
            ("<<<", ">>>")
        } else {
            ("{", "}")
        };
        write!(f, "  command {}", open)?;
        for part in parts {
            match part {
                StringPart::Text(text) => write!(f, "{}", text)?,
                StringPart::Placeholder(ph) => write!(f, "{}", ph)?,
            }
        }
        writeln!(f, "{}", close)?;

        if !self.outputs.is_empty() {
            writeln!(f, "  output {{")?;
            for decl in &self.outputs {
                writeln!(f, "    {}", decl)?;
            }
            writeln!(f, "  }}")?;
        }
        write_meta(f, "runtime", &self.runtime)?;
        write_meta(f, "meta", &self.meta)?;
        write_meta(f, "parameter_meta", &self.parameter_meta)?;
        write!(f, "}}")
    }
}

// ============================================================================
// DOCUMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub version: Option<String>,
    pub tasks: Vec<Task>,
}

impl Document {
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Check task names are unique, then type-check each task in isolation.
    pub fn typecheck(&self, check_quant: bool) -> Result<(), WdlError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(WdlError::validation(
                    ValidationKind::MultipleDefinitions {
                        name: task.name.clone(),
                    },
                    &task.pos,
                ));
            }
        }
        for task in &self.tasks {
            task.typecheck(None, check_quant)?;
        }
        Ok(())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(version) = &self.version {
            writeln!(f, "version {}\n", version)?;
        }
        for (i, task) in self.tasks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", task)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SourcePosition {
        SourcePosition::new("test", 1, 1, 1, 2)
    }

    fn ident(name: &str) -> Expr {
        Expr::new(pos(), ExprKind::Ident(vec![name.to_string()]))
    }

    fn decl(ty: Type, name: &str, expr: Option<Expr>) -> Decl {
        Decl::new(pos(), ty, name, false, false, expr).unwrap()
    }

    fn task(inputs: Option<Vec<Decl>>, postinputs: Vec<Decl>, outputs: Vec<Decl>) -> Task {
        Task {
            pos: pos(),
            name: "t".into(),
            inputs,
            postinputs,
            command: Expr::new(pos(), ExprKind::String(vec![StringPart::Text("true".into())])),
            outputs,
            parameter_meta: MetaMap::new(),
            runtime: MetaMap::new(),
            meta: MetaMap::new(),
        }
    }

    #[test]
    fn nonempty_requires_array() {
        let err = Decl::new(pos(), Type::int(), "x", false, true, None).unwrap_err();
        assert!(matches!(
            err.kind(),
            Some(ValidationKind::IncompatibleOperand { .. })
        ));
        let d = Decl::new(pos(), Type::array(Type::int()), "xs", false, true, None).unwrap();
        assert!(d.ty.nonempty());
        assert_eq!(d.to_string(), "Array[Int]+ xs");
    }

    #[test]
    fn bind_leaves_original_unbound() {
        let d = decl(Type::int(), "x", None);
        let bound = d.bind(Expr::new(pos(), ExprKind::Int(3)));
        assert!(d.expr.is_none());
        assert_eq!(bound.to_string(), "Int x = 3");
        assert_eq!(bound.pos, d.pos);
    }

    #[test]
    fn outputs_see_inputs_and_earlier_outputs() {
        let t = task(
            Some(vec![decl(Type::int(), "x", None)]),
            vec![],
            vec![
                decl(Type::int(), "y", Some(ident("x"))),
                decl(Type::float(), "z", Some(ident("y"))),
            ],
        );
        let env = t.typecheck(None, true).unwrap();
        assert_eq!(env.resolve("y"), Some(&Type::int()));
        assert_eq!(env.resolve("z"), Some(&Type::float()));
    }

    #[test]
    fn outer_env_is_visible() {
        let t = task(None, vec![decl(Type::string(), "s", Some(ident("outer")))], vec![]);
        assert!(t.typecheck(None, true).is_err());
        let outer = TypeEnv::new().bind("outer", Type::string());
        assert!(t.typecheck(Some(&outer), true).is_ok());
    }

    #[test]
    fn pre_1_0_help_hides_computed_decls() {
        let t = task(
            None,
            vec![
                decl(Type::int(), "a", None),
                decl(Type::int(), "b", Some(Expr::new(pos(), ExprKind::Int(1)))),
                decl(Type::int(), "c", Some(ident("a"))),
            ],
            vec![],
        );
        let names: Vec<_> = t.available_inputs().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        let required: Vec<_> = t.required_inputs().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(required, vec!["a"]);
        assert!(t.input("c").is_some());
        assert_eq!(
            t.input_help(),
            "\nrequired inputs:\n  Int a\n\noptional inputs:\n  Int b\n\noutputs:"
        );
    }

    #[test]
    fn input_help_lists_sections() {
        let opt = Decl::new(pos(), Type::string(), "label", true, false, None).unwrap();
        let t = task(
            Some(vec![decl(Type::int(), "x", None), opt]),
            vec![],
            vec![decl(Type::int(), "y", Some(ident("x")))],
        );
        assert_eq!(
            t.input_help(),
            "\nrequired inputs:\n  Int x\n\noptional inputs:\n  String? label\n\noutputs:\n  Int y"
        );
    }

    #[test]
    fn duplicate_task_names_are_rejected() {
        let doc = Document {
            version: None,
            tasks: vec![task(None, vec![], vec![]), task(None, vec![], vec![])],
        };
        assert!(matches!(
            doc.typecheck(true).unwrap_err().kind(),
            Some(ValidationKind::MultipleDefinitions { name }) if name == "t"
        ));
    }
}
