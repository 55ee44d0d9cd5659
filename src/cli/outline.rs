//! Brief outline of a loaded document.

use std::io::{self, Write};

use crate::ast::Document;

/// `task NAME` per task, sorted by name, followed by its declarations.
pub fn print_outline<W: Write>(out: &mut W, doc: &Document, level: usize) -> io::Result<()> {
    let indent = " ".repeat(level * 4);
    let mut tasks: Vec<_> = doc.tasks.iter().collect();
    tasks.sort_by(|a, b| a.name.cmp(&b.name));
    for task in tasks {
        writeln!(out, "{}task {}", indent, task.name)?;
        let decls = task
            .input_decls()
            .iter()
            .chain(&task.postinputs)
            .chain(&task.outputs);
        for decl in decls {
            writeln!(out, "{}    {}", indent, decl)?;
        }
    }
    Ok(())
}
