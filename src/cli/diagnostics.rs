//! Plain-text error presentation for the CLI.
//!
//! Each error prints as `(uri Ln L Col C) message` followed by the caret
//! excerpt. Aggregates print every member.

use std::io::{self, Write};

use termcolor::{Color, ColorSpec, WriteColor};

use crate::{diagnostics::QUANT_HINT, WdlError};

/// Print `err` and, when strict checking rejected something relaxed mode
/// would accept, the hint about `--no-quant-check`.
pub fn report<W: WriteColor>(out: &mut W, err: &WdlError, check_quant: bool) -> io::Result<()> {
    print_error(out, err)?;
    if check_quant && err.is_quantifier_mismatch() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
        write!(out, "* Hint:")?;
        out.reset()?;
        writeln!(out, " {}", QUANT_HINT)?;
    }
    Ok(())
}

pub fn print_error<W: WriteColor>(out: &mut W, err: &WdlError) -> io::Result<()> {
    if let WdlError::MultipleValidation { errors } = err {
        for inner in errors {
            print_error(out, inner)?;
        }
        return Ok(());
    }

    if let Some(pos) = err.pos() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "({} Ln {} Col {})", pos.uri, pos.line, pos.column)?;
        out.reset()?;
        writeln!(out, " {}", err)?;
    } else {
        writeln!(out, "{}", err)?;
    }
    if let Some(excerpt) = err.excerpt() {
        writeln!(out, "{}", excerpt)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{loader::load_source, LoadOptions};
    use termcolor::Buffer;

    fn render(err: &WdlError, check_quant: bool) -> String {
        let mut buf = Buffer::no_color();
        report(&mut buf, err, check_quant).unwrap();
        String::from_utf8(buf.into_inner()).unwrap()
    }

    #[test]
    fn error_line_and_excerpt() {
        let text = "task t {\n  Int x = \"s\"\n  command {}\n}";
        let err = load_source(text, "t.wdl", LoadOptions::default()).unwrap_err();
        let out = render(&err, true);
        assert_eq!(
            out,
            "(t.wdl Ln 2 Col 11) expected Int instead of String\n      Int x = \"s\"\n              ^^^\n"
        );
    }

    #[test]
    fn hint_only_for_quantifier_mismatch() {
        let text = "task t { input { Int? x } Int y = x command {} }";
        let err = load_source(text, "t.wdl", LoadOptions::default()).unwrap_err();
        assert!(render(&err, true).contains("* Hint: "));
        assert!(!render(&err, false).contains("* Hint: "));
    }
}
