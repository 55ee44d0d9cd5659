//! Unified, `miette`-based error type for every stage of loading a document.
//!
//! The AST and type checker raise errors carrying only a [`SourcePosition`].
//! Whoever holds the source text (the loader) then calls
//! [`WdlError::with_source`] to attach it, after which the error can be
//! rendered either through `miette::Report` or as the plain caret excerpt
//! returned by [`WdlError::excerpt`].

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode, SourceSpan};
use thiserror::Error;
use unicode_width::UnicodeWidthStr;

use crate::ast::{SourcePosition, Type};

pub type SourceArc = Arc<NamedSource<String>>;

/// Hint shown when a type mismatch would pass with relaxed quantifier checks.
pub const QUANT_HINT: &str = "for compatibility with older existing WDL code, try setting \
     --no-quant-check to relax quantifier validation rules";

// ============================================================================
// VALIDATION KINDS
// ============================================================================

/// Every semantic fault the front end can report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationKind {
    #[error("unknown identifier {name}")]
    UnknownIdentifier { name: String },
    #[error("no such function: {name}")]
    NoSuchFunction { name: String },
    #[error("{function} expects {expected} argument(s) but got {actual}")]
    WrongArity {
        function: String,
        expected: usize,
        actual: usize,
    },
    #[error("{message}")]
    IncompatibleOperand { message: String },
    #[error("expected {expected} instead of {actual}")]
    StaticTypeMismatch { expected: Type, actual: Type },
    #[error("redundant {section} section in task")]
    DuplicateSection { section: String },
    #[error("task {task} has no {section} section")]
    MissingSection { task: String, section: String },
    #[error("duplicate key {key} in {context}")]
    DuplicateKey { key: String, context: String },
    #[error("multiple definitions of {name}")]
    MultipleDefinitions { name: String },
    #[error("invalid {literal_type} literal {value}")]
    InvalidLiteral { literal_type: String, value: String },
}

impl ValidationKind {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationKind::UnknownIdentifier { .. } => "wdl::unknown_identifier",
            ValidationKind::NoSuchFunction { .. } => "wdl::no_such_function",
            ValidationKind::WrongArity { .. } => "wdl::wrong_arity",
            ValidationKind::IncompatibleOperand { .. } => "wdl::incompatible_operand",
            ValidationKind::StaticTypeMismatch { .. } => "wdl::static_type_mismatch",
            ValidationKind::DuplicateSection { .. } => "wdl::duplicate_section",
            ValidationKind::MissingSection { .. } => "wdl::missing_section",
            ValidationKind::DuplicateKey { .. } => "wdl::duplicate_key",
            ValidationKind::MultipleDefinitions { .. } => "wdl::multiple_definitions",
            ValidationKind::InvalidLiteral { .. } => "wdl::invalid_literal",
        }
    }
}

// ============================================================================
// ERROR CONTEXT
// ============================================================================

/// Source text attached after the fact, plus the byte span it implies.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub text: Option<Arc<str>>,
    pub span: Option<SourceSpan>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    fn for_position(pos: &SourcePosition, text: &Arc<str>) -> Self {
        let span = pos
            .byte_range(text)
            .map(|(start, end)| SourceSpan::from((start, end - start)));
        Self {
            source: Some(Arc::new(NamedSource::new(
                pos.uri.to_string(),
                text.to_string(),
            ))),
            text: Some(Arc::clone(text)),
            span,
        }
    }
}

// ============================================================================
// WDL ERROR
// ============================================================================

#[derive(Debug, Error)]
pub enum WdlError {
    /// The grammar rejected the input.
    #[error("{message}")]
    Syntax {
        message: String,
        pos: SourcePosition,
        ctx: ErrorContext,
    },
    /// A position-carrying semantic fault.
    #[error("{kind}")]
    Validation {
        kind: ValidationKind,
        pos: SourcePosition,
        ctx: ErrorContext,
    },
    /// One entry per failing document.
    #[error("{} documents failed validation", .errors.len())]
    MultipleValidation { errors: Vec<WdlError> },
    /// The grammar produced a tree the AST builder does not expect.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        pos: Option<SourcePosition>,
    },
    #[error("unable to read {uri}: {source}")]
    Io {
        uri: String,
        #[source]
        source: std::io::Error,
    },
}

impl WdlError {
    pub fn validation(kind: ValidationKind, pos: &SourcePosition) -> Self {
        WdlError::Validation {
            kind,
            pos: pos.clone(),
            ctx: ErrorContext::none(),
        }
    }

    pub fn syntax(message: impl Into<String>, pos: SourcePosition) -> Self {
        WdlError::Syntax {
            message: message.into(),
            pos,
            ctx: ErrorContext::none(),
        }
    }

    pub fn internal(message: impl Into<String>, pos: Option<&SourcePosition>) -> Self {
        WdlError::Internal {
            message: message.into(),
            pos: pos.cloned(),
        }
    }

    pub fn type_mismatch(expected: &Type, actual: &Type, pos: &SourcePosition) -> Self {
        Self::validation(
            ValidationKind::StaticTypeMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            },
            pos,
        )
    }

    /// Combine per-document failures: none is `None`, one is returned as
    /// is, several become `MultipleValidation`.
    pub fn aggregate(mut errors: Vec<WdlError>) -> Option<WdlError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(WdlError::MultipleValidation { errors }),
        }
    }

    pub fn pos(&self) -> Option<&SourcePosition> {
        match self {
            WdlError::Syntax { pos, .. } | WdlError::Validation { pos, .. } => Some(pos),
            WdlError::Internal { pos, .. } => pos.as_ref(),
            WdlError::MultipleValidation { .. } | WdlError::Io { .. } => None,
        }
    }

    pub fn kind(&self) -> Option<&ValidationKind> {
        match self {
            WdlError::Validation { kind, .. } => Some(kind),
            _ => None,
        }
    }

    fn ctx(&self) -> Option<&ErrorContext> {
        match self {
            WdlError::Syntax { ctx, .. } | WdlError::Validation { ctx, .. } => Some(ctx),
            _ => None,
        }
    }

    /// Attach the text of the document the error's position refers to.
    pub fn with_source(self, text: &Arc<str>) -> Self {
        match self {
            WdlError::Syntax { message, pos, .. } => {
                let ctx = ErrorContext::for_position(&pos, text);
                WdlError::Syntax { message, pos, ctx }
            }
            WdlError::Validation { kind, pos, .. } => {
                let ctx = ErrorContext::for_position(&pos, text);
                WdlError::Validation { kind, pos, ctx }
            }
            other => other,
        }
    }

    /// A static type mismatch that relaxed quantifier checking would accept.
    pub fn is_quantifier_mismatch(&self) -> bool {
        match self {
            WdlError::Validation {
                kind: ValidationKind::StaticTypeMismatch { expected, actual },
                ..
            } => actual.coerces(expected, false),
            WdlError::MultipleValidation { errors } => {
                errors.iter().any(WdlError::is_quantifier_mismatch)
            }
            _ => false,
        }
    }

    /// The offending source line with a caret underline beneath
    /// `[column, end_column)`, clamped to that line. Needs attached source.
    pub fn excerpt(&self) -> Option<String> {
        let pos = self.pos()?;
        let text = self.ctx()?.text.as_ref()?;
        render_excerpt(text, pos)
    }
}

/// Render the excerpt for `pos` within `text`.
pub fn render_excerpt(text: &str, pos: &SourcePosition) -> Option<String> {
    let line: String = text
        .split('\n')
        .nth(pos.line.checked_sub(1)?)?
        .trim_end_matches('\r')
        .replace('\t', " ");
    let chars: Vec<char> = line.chars().collect();

    let mut end_column = if pos.end_line > pos.line {
        chars.len() + 1
    } else {
        pos.end_column.min(chars.len() + 1)
    };
    while end_column > pos.column + 1 && chars.get(end_column - 2) == Some(&' ') {
        end_column -= 1;
    }

    let column = pos.column.clamp(1, chars.len() + 1);
    let lead: String = chars[..column - 1].iter().collect();
    let underlined: String = chars[column - 1..end_column.max(column) - 1]
        .iter()
        .collect();
    let carets = underlined.width().max(1);

    Some(format!(
        "    {}\n    {}{}",
        line,
        " ".repeat(lead.width()),
        "^".repeat(carets)
    ))
}

// ============================================================================
// MIETTE INTEGRATION
// ============================================================================

impl Diagnostic for WdlError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self {
            WdlError::Syntax { .. } => "wdl::syntax",
            WdlError::Validation { kind, .. } => kind.code(),
            WdlError::MultipleValidation { .. } => "wdl::multiple",
            WdlError::Internal { .. } => "wdl::internal",
            WdlError::Io { .. } => "wdl::io",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        match self {
            WdlError::Validation { .. } if self.is_quantifier_mismatch() => {
                Some(Box::new(QUANT_HINT))
            }
            WdlError::Internal { .. } => Some(Box::new(
                "this is a bug in the WDL front end; please report it",
            )),
            _ => None,
        }
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx()?
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.ctx()?.span?;
        let len = span.len().max(1);
        let label = LabeledSpan::new(Some(self.to_string()), span.offset(), len);
        Some(Box::new(std::iter::once(label)))
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        match self {
            WdlError::MultipleValidation { errors } => Some(Box::new(
                errors.iter().map(|e| e as &dyn Diagnostic),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize, end_line: usize, end_column: usize) -> SourcePosition {
        SourcePosition::new("test.wdl", line, column, end_line, end_column)
    }

    #[test]
    fn excerpt_underlines_span() {
        let text = "task t {\n  Int x = \"s\"\n}";
        let out = render_excerpt(text, &pos(2, 11, 2, 14)).unwrap();
        assert_eq!(out, "      Int x = \"s\"\n              ^^^");
    }

    #[test]
    fn excerpt_clamps_multiline_span_and_trims_blanks() {
        let text = "  abc   \nxyz";
        let out = render_excerpt(text, &pos(1, 3, 2, 2)).unwrap();
        assert_eq!(out, "      abc   \n      ^^^");
    }

    #[test]
    fn quantifier_mismatch_detection() {
        let optional = Type::string().with_optional(true);
        let err = WdlError::type_mismatch(&Type::string(), &optional, &pos(1, 1, 1, 2));
        assert!(err.is_quantifier_mismatch());
        let err = WdlError::type_mismatch(&Type::int(), &Type::string(), &pos(1, 1, 1, 2));
        assert!(!err.is_quantifier_mismatch());
    }

    #[test]
    fn aggregate_wraps_only_several_failures() {
        let failure = || {
            WdlError::validation(
                ValidationKind::UnknownIdentifier { name: "x".into() },
                &pos(1, 1, 1, 2),
            )
        };
        assert!(WdlError::aggregate(vec![]).is_none());
        assert!(matches!(
            WdlError::aggregate(vec![failure()]),
            Some(WdlError::Validation { .. })
        ));
        assert!(matches!(
            WdlError::aggregate(vec![failure(), failure()]),
            Some(WdlError::MultipleValidation { errors }) if errors.len() == 2
        ));
    }

    #[test]
    fn with_source_computes_span() {
        let text: Arc<str> = Arc::from("Int x = y");
        let err = WdlError::validation(
            ValidationKind::UnknownIdentifier { name: "y".into() },
            &pos(1, 9, 1, 10),
        )
        .with_source(&text);
        let labels: Vec<_> = err.labels().unwrap().collect();
        assert_eq!(labels[0].offset(), 8);
        assert_eq!(labels[0].len(), 1);
        assert!(err.excerpt().unwrap().ends_with("        ^"));
    }
}
