//! Source provenance attached to every AST node.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Where a node came from: document URI plus a 1-based line/column range.
///
/// `end_column` is exclusive, so a node spanning `abc` at column 1 ends at
/// column 4. Positions are fixed when a node is built and never recomputed.
///
/// # Examples
///
/// ```rust
/// use wdlcheck::ast::SourcePosition;
/// let pos = SourcePosition::new("t.wdl", 2, 5, 2, 9);
/// assert_eq!(pos.to_string(), "t.wdl:2:5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub uri: Arc<str>,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourcePosition {
    pub fn new(
        uri: impl Into<Arc<str>>,
        line: usize,
        column: usize,
        end_line: usize,
        end_column: usize,
    ) -> Self {
        Self {
            uri: uri.into(),
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Smallest position covering both `self` and `other`.
    pub fn merge(&self, other: &SourcePosition) -> SourcePosition {
        let start = if (self.line, self.column) <= (other.line, other.column) {
            self
        } else {
            other
        };
        let end = if (self.end_line, self.end_column) >= (other.end_line, other.end_column) {
            self
        } else {
            other
        };
        SourcePosition {
            uri: Arc::clone(&self.uri),
            line: start.line,
            column: start.column,
            end_line: end.end_line,
            end_column: end.end_column,
        }
    }

    /// Byte offsets `[start, end)` of this position within `text`, if the
    /// position lies inside it.
    pub fn byte_range(&self, text: &str) -> Option<(usize, usize)> {
        let start = line_col_to_offset(text, self.line, self.column)?;
        let end = line_col_to_offset(text, self.end_line, self.end_column)?;
        Some((start, end.max(start)))
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.uri, self.line, self.column)
    }
}

/// Convert a 1-based (line, column) pair to a byte offset. The column may
/// point one past the last character of the line.
fn line_col_to_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    let mut offset = 0;
    for (idx, content) in text.split('\n').enumerate() {
        if idx + 1 == line {
            let mut chars = content.char_indices();
            for _ in 1..column {
                chars.next()?;
            }
            let within = chars.next().map(|(i, _)| i).unwrap_or(content.len());
            return Some(offset + within);
        }
        offset += content.len() + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both_ranges() {
        let a = SourcePosition::new("x", 1, 5, 1, 8);
        let b = SourcePosition::new("x", 2, 1, 2, 4);
        let merged = a.merge(&b);
        assert_eq!((merged.line, merged.column), (1, 5));
        assert_eq!((merged.end_line, merged.end_column), (2, 4));
        assert_eq!(b.merge(&a), merged);
    }

    #[test]
    fn byte_range_on_second_line() {
        let text = "task t {\n  Int x\n}";
        let pos = SourcePosition::new("x", 2, 3, 2, 8);
        let (start, end) = pos.byte_range(text).unwrap();
        assert_eq!(&text[start..end], "Int x");
    }

    #[test]
    fn byte_range_outside_text() {
        let pos = SourcePosition::new("x", 9, 1, 9, 2);
        assert_eq!(pos.byte_range("one line"), None);
    }
}
