//! Grammar-to-AST transformer.
//!
//! pest produces a concrete tree keyed by the rule names in `grammar.pest`;
//! each `build_*` function matches on those rules and produces exactly one
//! AST node, stamping it with the position of the pair it came from. The
//! builder is purely syntactic apart from two checks done while aggregating:
//! duplicate task sections and duplicate keys.

use std::sync::Arc;

use indexmap::IndexMap;
use pest::{
    error::{Error, LineColLocation},
    iterators::{Pair, Pairs},
    Parser,
};
use pest_derive::Parser;
use serde_json::Value;

use crate::{
    ast::{Decl, Document, Expr, ExprKind, Placeholder, SourcePosition, StringPart, Task, Type},
    diagnostics::ValidationKind,
    syntax::meta::{self, MetaMap, MetaValue},
    WdlError,
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct WdlParser;

/// Builds AST nodes for one document, all positioned under `uri`.
pub struct Builder {
    uri: Arc<str>,
}

// ============================================================================
// PUBLIC API
// ============================================================================

impl Builder {
    pub fn new(uri: impl Into<Arc<str>>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn expr(&self, text: &str) -> Result<Expr, WdlError> {
        let root = self.parse(Rule::expr_file, text)?;
        let pos = self.pos(&root);
        let mut inner = root.into_inner();
        self.build_expr(self.next(&mut inner, &pos, "expression")?)
    }

    pub fn task(&self, text: &str) -> Result<Task, WdlError> {
        let root = self.parse(Rule::task_file, text)?;
        let pos = self.pos(&root);
        let mut inner = root.into_inner();
        self.build_task(self.next(&mut inner, &pos, "task")?)
    }

    pub fn document(&self, text: &str) -> Result<Document, WdlError> {
        let root = self.parse(Rule::document, text)?;
        let pos = self.pos(&root);
        let mut version = None;
        let mut tasks = Vec::new();
        for pair in root.into_inner() {
            match pair.as_rule() {
                Rule::version => {
                    let mut inner = pair.into_inner();
                    version = Some(self.next(&mut inner, &pos, "version number")?.as_str().to_string());
                }
                Rule::task => tasks.push(self.build_task(pair)?),
                Rule::EOI => {}
                rule => return Err(self.unexpected(rule, &pos)),
            }
        }
        Ok(Document { version, tasks })
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

impl Builder {
    fn build_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, WdlError> {
        let pos = self.pos(&pair);
        match pair.as_rule() {
            Rule::expr_lor | Rule::expr_land | Rule::expr_cmp | Rule::expr_add | Rule::expr_mul => {
                self.build_binary(pair.into_inner(), &pos)
            }

            Rule::negate | Rule::neg => {
                let function = if pair.as_rule() == Rule::negate {
                    "_negate"
                } else {
                    "_neg"
                };
                let mut inner = pair.into_inner();
                let operand = self.build_expr(self.next(&mut inner, &pos, "operand")?)?;
                Ok(Expr::apply(pos, function, vec![operand]))
            }

            Rule::expr_postfix => {
                let mut inner = pair.into_inner();
                let mut base = self.build_expr(self.next(&mut inner, &pos, "expression")?)?;
                for index in inner {
                    let index_pos = self.pos(&index);
                    let mut parts = index.into_inner();
                    let subscript = self.build_expr(self.next(&mut parts, &index_pos, "index")?)?;
                    let pos = base.pos.merge(&index_pos);
                    base = Expr::apply(pos, "_get", vec![base, subscript]);
                }
                Ok(base)
            }

            Rule::ifthenelse => {
                let mut inner = pair.into_inner();
                let condition = self.build_expr(self.next(&mut inner, &pos, "condition")?)?;
                let consequent = self.build_expr(self.next(&mut inner, &pos, "consequent")?)?;
                let alternative = self.build_expr(self.next(&mut inner, &pos, "alternative")?)?;
                Ok(Expr::new(
                    pos,
                    ExprKind::IfThenElse {
                        condition: Box::new(condition),
                        consequent: Box::new(consequent),
                        alternative: Box::new(alternative),
                    },
                ))
            }

            Rule::array => {
                let items = pair
                    .into_inner()
                    .map(|item| self.build_expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::new(pos, ExprKind::Array(items)))
            }

            Rule::apply => {
                let mut inner = pair.into_inner();
                let function = self.next(&mut inner, &pos, "function name")?.as_str().to_string();
                let args = inner
                    .map(|arg| self.build_expr(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::apply(pos, function, args))
            }

            Rule::ident => {
                let parts = pair.into_inner().map(|p| p.as_str().to_string()).collect();
                Ok(Expr::new(pos, ExprKind::Ident(parts)))
            }

            Rule::int => {
                let value = pair.as_str().parse::<i64>().map_err(|_| {
                    self.invalid_literal("Int", pair.as_str(), &pos)
                })?;
                Ok(Expr::new(pos, ExprKind::Int(value)))
            }

            Rule::float => {
                let value = pair
                    .as_str()
                    .parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .ok_or_else(|| self.invalid_literal("Float", pair.as_str(), &pos))?;
                Ok(Expr::new(pos, ExprKind::Float(value)))
            }

            Rule::boolean_true => Ok(Expr::new(pos, ExprKind::Boolean(true))),
            Rule::boolean_false => Ok(Expr::new(pos, ExprKind::Boolean(false))),

            Rule::string => {
                let parts = self.build_string_parts(pair.into_inner())?;
                Ok(Expr::new(pos, ExprKind::String(parts)))
            }

            rule => Err(self.unexpected(rule, &pos)),
        }
    }

    /// Fold `operand (op operand)*` left-associatively into `_op` applications.
    fn build_binary(&self, mut inner: Pairs<'_, Rule>, pos: &SourcePosition) -> Result<Expr, WdlError> {
        let mut lhs = self.build_expr(self.next(&mut inner, pos, "operand")?)?;
        while let Some(op) = inner.next() {
            let function = match op.as_rule() {
                Rule::lor => "_lor",
                Rule::land => "_land",
                Rule::eqeq => "_eqeq",
                Rule::neq => "_neq",
                Rule::lt => "_lt",
                Rule::lte => "_lte",
                Rule::gt => "_gt",
                Rule::gte => "_gte",
                Rule::add => "_add",
                Rule::sub => "_sub",
                Rule::mul => "_mul",
                Rule::div => "_div",
                Rule::rem => "_rem",
                rule => return Err(self.unexpected(rule, pos)),
            };
            let rhs = self.build_expr(self.next(&mut inner, pos, "operand")?)?;
            let merged = lhs.pos.merge(&rhs.pos);
            lhs = Expr::apply(merged, function, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    /// Literal text and placeholders of a string or command. Fragments that
    /// open an interpolation end in `${` or `~{`, which is stripped; closing
    /// braces are dropped. Single-quoted text is stored in its double-quoted
    /// spelling.
    fn build_string_parts(&self, pairs: Pairs<'_, Rule>) -> Result<Vec<StringPart>, WdlError> {
        let mut parts = Vec::new();
        for pair in pairs {
            match pair.as_rule() {
                Rule::dq_interp | Rule::sq_interp | Rule::brace_interp | Rule::heredoc_interp => {
                    let text = pair.as_str();
                    let text = &text[..text.len().saturating_sub(2)];
                    if !text.is_empty() {
                        parts.push(StringPart::Text(self.fragment_text(pair.as_rule(), text)));
                    }
                }
                Rule::dq_fragment
                | Rule::sq_fragment
                | Rule::brace_fragment
                | Rule::heredoc_fragment => {
                    parts.push(StringPart::Text(self.fragment_text(pair.as_rule(), pair.as_str())))
                }
                Rule::placeholder => parts.push(StringPart::Placeholder(self.build_placeholder(pair)?)),
                Rule::placeholder_close => {}
                rule => return Err(self.unexpected(rule, &self.pos(&pair))),
            }
        }
        Ok(parts)
    }

    fn build_placeholder(&self, pair: Pair<'_, Rule>) -> Result<Placeholder, WdlError> {
        let pos = self.pos(&pair);
        let mut options = IndexMap::new();
        let mut expr = None;
        for child in pair.into_inner() {
            if child.as_rule() != Rule::placeholder_option {
                expr = Some(self.build_expr(child)?);
                continue;
            }
            let option_pos = self.pos(&child);
            let mut inner = child.into_inner();
            let name = self.next(&mut inner, &option_pos, "option name")?.as_str().to_string();
            let mut value = self.next(&mut inner, &option_pos, "option value")?.into_inner();
            let value = self.next(&mut value, &option_pos, "option text")?;
            let value = self.fragment_text(value.as_rule(), value.as_str());
            if options.contains_key(&name) {
                return Err(WdlError::validation(
                    ValidationKind::DuplicateKey {
                        key: name,
                        context: "placeholder".into(),
                    },
                    &option_pos,
                ));
            }
            options.insert(name, value);
        }
        let expr = expr.ok_or_else(|| WdlError::internal("placeholder without expression", Some(&pos)))?;
        Ok(Placeholder {
            pos,
            options,
            expr: Box::new(expr),
        })
    }
}

// ============================================================================
// TYPES & DECLARATIONS
// ============================================================================

impl Builder {
    fn build_type(&self, pair: Pair<'_, Rule>) -> Result<Type, WdlError> {
        let pos = self.pos(&pair);
        match pair.as_rule() {
            Rule::int_type => Ok(Type::int()),
            Rule::float_type => Ok(Type::float()),
            Rule::boolean_type => Ok(Type::boolean()),
            Rule::string_type => Ok(Type::string()),
            Rule::file_type => Ok(Type::file()),
            Rule::array_type => {
                let mut inner = pair.into_inner();
                let mut item = self.next(&mut inner, &pos, "array item")?.into_inner();
                let mut item_type = self.build_type(self.next(&mut item, &pos, "item type")?)?;
                if let Some(quantifier) = item.next() {
                    let (optional, nonempty) = self.quantifier(&quantifier)?;
                    item_type = item_type
                        .quantified(optional, nonempty)
                        .map_err(|kind| WdlError::validation(kind, &pos))?;
                }
                Ok(Type::array(item_type))
            }
            rule => Err(self.unexpected(rule, &pos)),
        }
    }

    /// `(optional, nonempty)` for a `?` or `+` token.
    fn quantifier(&self, pair: &Pair<'_, Rule>) -> Result<(bool, bool), WdlError> {
        match pair.as_str() {
            "?" => Ok((true, false)),
            "+" => Ok((false, true)),
            other => Err(WdlError::internal(
                format!("unknown quantifier {other:?}"),
                Some(&self.pos(pair)),
            )),
        }
    }

    fn build_decl(&self, pair: Pair<'_, Rule>) -> Result<Decl, WdlError> {
        let pos = self.pos(&pair);
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();
        match rule {
            Rule::decl => {
                let ty = self.build_type(self.next(&mut inner, &pos, "type")?)?;
                let name = self.next(&mut inner, &pos, "name")?.as_str();
                Decl::new(pos, ty, name, false, false, None)
            }
            Rule::quantified_decl => {
                let ty = self.build_type(self.next(&mut inner, &pos, "type")?)?;
                let (optional, nonempty) = self.quantifier(&self.next(&mut inner, &pos, "quantifier")?)?;
                let name = self.next(&mut inner, &pos, "name")?.as_str();
                Decl::new(pos, ty, name, optional, nonempty, None)
            }
            Rule::bound_decl => {
                let decl = self.build_decl(self.next(&mut inner, &pos, "declaration")?)?;
                let expr = self.build_expr(self.next(&mut inner, &pos, "initializer")?)?;
                Ok(decl.bind(expr))
            }
            rule => Err(self.unexpected(rule, &pos)),
        }
    }

    fn build_decls(&self, pairs: Pairs<'_, Rule>) -> Result<Vec<Decl>, WdlError> {
        pairs.map(|pair| self.build_decl(pair)).collect()
    }
}

// ============================================================================
// TASKS & META SECTIONS
// ============================================================================

/// Store a section, rejecting a second occurrence.
fn set_section<T>(
    slot: &mut Option<T>,
    value: T,
    section: &str,
    pos: &SourcePosition,
) -> Result<(), WdlError> {
    if slot.is_some() {
        return Err(WdlError::validation(
            ValidationKind::DuplicateSection {
                section: section.to_string(),
            },
            pos,
        ));
    }
    *slot = Some(value);
    Ok(())
}

impl Builder {
    fn build_task(&self, pair: Pair<'_, Rule>) -> Result<Task, WdlError> {
        let pos = self.pos(&pair);
        let mut name = None;
        let mut inputs = None;
        let mut postinputs = Vec::new();
        let mut command = None;
        let mut outputs = None;
        let mut parameter_meta = None;
        let mut runtime = None;
        let mut meta = None;

        for section in pair.into_inner() {
            let section_pos = self.pos(&section);
            match section.as_rule() {
                Rule::name => set_section(&mut name, section.as_str().to_string(), "name", &section_pos)?,
                Rule::input_decls => {
                    let decls = self.build_decls(section.into_inner())?;
                    set_section(&mut inputs, decls, "input", &section_pos)?;
                }
                Rule::output_decls => {
                    let decls = self.build_decls(section.into_inner())?;
                    set_section(&mut outputs, decls, "output", &section_pos)?;
                }
                Rule::command => {
                    let parts = self.build_string_parts(section.into_inner())?;
                    let expr = Expr::new(section_pos.clone(), ExprKind::String(parts));
                    set_section(&mut command, expr, "command", &section_pos)?;
                }
                Rule::meta_section => {
                    let mut inner = section.into_inner();
                    let kind = self.next(&mut inner, &section_pos, "section kind")?.as_str();
                    let entries = self.build_meta_entries(inner, kind)?;
                    let slot = match kind {
                        "parameter_meta" => &mut parameter_meta,
                        "runtime" => &mut runtime,
                        _ => &mut meta,
                    };
                    set_section(slot, entries, kind, &section_pos)?;
                }
                Rule::decl | Rule::quantified_decl | Rule::bound_decl => {
                    postinputs.push(self.build_decl(section)?)
                }
                rule => return Err(self.unexpected(rule, &section_pos)),
            }
        }

        let name = name.ok_or_else(|| WdlError::internal("task without a name", Some(&pos)))?;
        let command = command.ok_or_else(|| {
            WdlError::validation(
                ValidationKind::MissingSection {
                    task: name.clone(),
                    section: "command".into(),
                },
                &pos,
            )
        })?;
        Ok(Task {
            pos,
            name,
            inputs,
            postinputs,
            command,
            outputs: outputs.unwrap_or_default(),
            parameter_meta: parameter_meta.unwrap_or_default(),
            runtime: runtime.unwrap_or_default(),
            meta: meta.unwrap_or_default(),
        })
    }

    fn build_meta_entries(&self, pairs: Pairs<'_, Rule>, context: &str) -> Result<MetaMap, WdlError> {
        let mut map = MetaMap::new();
        for kv in pairs {
            let pos = self.pos(&kv);
            let mut inner = kv.into_inner();
            let key_pair = self.next(&mut inner, &pos, "meta key")?;
            let key = match key_pair.as_rule() {
                Rule::string => match meta::fold(&self.build_expr(key_pair)?)? {
                    Value::String(key) => key,
                    other => return Err(self.invalid_literal("meta key", &other.to_string(), &pos)),
                },
                _ => key_pair.as_str().to_string(),
            };
            let value = self.build_meta_value(self.next(&mut inner, &pos, "meta value")?)?;
            if map.contains_key(&key) {
                return Err(WdlError::validation(
                    ValidationKind::DuplicateKey {
                        key,
                        context: context.to_string(),
                    },
                    &pos,
                ));
            }
            map.insert(key, value);
        }
        Ok(map)
    }

    fn build_meta_value(&self, pair: Pair<'_, Rule>) -> Result<MetaValue, WdlError> {
        match pair.as_rule() {
            Rule::meta_object => Ok(Value::Object(
                self.build_meta_entries(pair.into_inner(), "meta object")?,
            )),
            Rule::meta_array => pair
                .into_inner()
                .map(|item| self.build_meta_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Rule::null => Ok(Value::Null),
            _ => meta::fold(&self.build_expr(pair)?),
        }
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

impl Builder {
    fn parse<'i>(&self, rule: Rule, text: &'i str) -> Result<Pair<'i, Rule>, WdlError> {
        let mut pairs = WdlParser::parse(rule, text).map_err(|e| self.syntax_error(e))?;
        pairs
            .next()
            .ok_or_else(|| WdlError::internal(format!("{rule:?} produced no tree"), None))
    }

    fn fragment_text(&self, rule: Rule, raw: &str) -> String {
        match rule {
            Rule::sq_interp | Rule::sq_fragment | Rule::sq_option => requote(raw),
            _ => raw.to_string(),
        }
    }

    fn pos(&self, pair: &Pair<'_, Rule>) -> SourcePosition {
        let span = pair.as_span();
        let (line, column) = span.start_pos().line_col();
        let (end_line, end_column) = span.end_pos().line_col();
        SourcePosition::new(Arc::clone(&self.uri), line, column, end_line, end_column)
    }

    /// Next child the grammar guarantees to be present.
    fn next<'i>(
        &self,
        pairs: &mut Pairs<'i, Rule>,
        pos: &SourcePosition,
        what: &str,
    ) -> Result<Pair<'i, Rule>, WdlError> {
        pairs
            .next()
            .ok_or_else(|| WdlError::internal(format!("missing {what}"), Some(pos)))
    }

    fn unexpected(&self, rule: Rule, pos: &SourcePosition) -> WdlError {
        WdlError::internal(format!("unexpected grammar rule {rule:?}"), Some(pos))
    }

    fn invalid_literal(&self, literal_type: &str, value: &str, pos: &SourcePosition) -> WdlError {
        WdlError::validation(
            ValidationKind::InvalidLiteral {
                literal_type: literal_type.to_string(),
                value: value.to_string(),
            },
            pos,
        )
    }

    fn syntax_error(&self, err: Error<Rule>) -> WdlError {
        let ((line, column), (end_line, end_column)) = match err.line_col {
            LineColLocation::Pos((line, column)) => ((line, column), (line, column + 1)),
            LineColLocation::Span(start, end) => (start, end),
        };
        WdlError::syntax(
            err.variant.message().into_owned(),
            SourcePosition::new(Arc::clone(&self.uri), line, column, end_line, end_column),
        )
    }
}

/// Respell single-quoted text for double quotes: `"` gains a backslash and
/// `\'` loses one. Other escapes are kept as written.
fn requote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
    }
    out
}
