//! Rendering of errors: caret excerpts, miette metadata, and aggregates.

use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme};
use wdlcheck::diagnostics::QUANT_HINT;
use wdlcheck::{load_all, load_source, LoadOptions, WdlError};

fn load_err(text: &str) -> WdlError {
    load_source(text, "t.wdl", LoadOptions::default()).unwrap_err()
}

fn render(err: &WdlError) -> String {
    let mut out = String::new();
    GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor())
        .render_report(&mut out, err)
        .unwrap();
    out
}

#[test]
fn test_excerpt_underlines_expression() {
    let err = load_err("task t {\n  String s = 1 + true\n  command {}\n}");
    let excerpt = err.excerpt().unwrap();
    let lines: Vec<&str> = excerpt.lines().collect();
    assert_eq!(lines[0], "      String s = 1 + true");
    assert_eq!(lines[1], "                     ^^^^");
}

#[test]
fn test_excerpt_clamps_multiline_span() {
    let err = load_err("task t {\n  Int x = if true\n    then \"a\"\n    else \"b\"\n  command {}\n}");
    let excerpt = err.excerpt().unwrap();
    let lines: Vec<&str> = excerpt.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "      Int x = if true");
    assert_eq!(lines[1], "              ^^^^^^^");
}

#[test]
fn test_excerpt_expands_tabs() {
    let err = load_err("task t {\n\tInt x = y\n\tcommand {}\n}");
    assert_eq!(err.excerpt().unwrap(), "     Int x = y\n             ^");
}

#[test]
fn test_miette_metadata() {
    let err = load_err("task t { input { File? f } File g = f command {} }");
    assert_eq!(err.code().unwrap().to_string(), "wdl::static_type_mismatch");
    assert_eq!(err.help().unwrap().to_string(), QUANT_HINT);
    let label = err.labels().unwrap().next().unwrap();
    assert_eq!(label.offset(), 36);
    assert_eq!(label.len(), 1);
}

#[test]
fn test_graphical_report_includes_code_and_source() {
    let err = load_err("task t {\n  Int n = missing\n  command {}\n}");
    let report = render(&err);
    assert!(report.contains("wdl::unknown_identifier"), "{report}");
    assert!(report.contains("unknown identifier missing"), "{report}");
    assert!(report.contains("Int n = missing"), "{report}");
}

#[test]
fn test_syntax_error_metadata() {
    let err = load_err("task t {\n  Int\n}");
    assert!(matches!(err, WdlError::Syntax { .. }));
    assert_eq!(err.code().unwrap().to_string(), "wdl::syntax");
    assert!(err.help().is_none());
}

#[test]
fn test_load_all_aggregates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.wdl");
    let bad1 = dir.path().join("bad1.wdl");
    let bad2 = dir.path().join("bad2.wdl");
    std::fs::write(&good, "task g { command {} }").unwrap();
    std::fs::write(&bad1, "task b { Int x = y command {} }").unwrap();
    std::fs::write(&bad2, "task b { String? s  String t = s command {} }").unwrap();

    let err = load_all(&[&good, &bad1, &bad2], LoadOptions::default()).unwrap_err();
    let WdlError::MultipleValidation { errors } = &err else {
        panic!("expected aggregate, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.excerpt().is_some()));
    assert!(err.is_quantifier_mismatch());
    assert_eq!(err.related().unwrap().count(), 2);

    let single = load_all(&[&good, &bad1], LoadOptions::default()).unwrap_err();
    assert!(matches!(single, WdlError::Validation { .. }));
    assert_eq!(load_all(&[&good], LoadOptions::default()).unwrap().len(), 1);
}
