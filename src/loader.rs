//! Read, parse, and type-check documents.
//!
//! The loader owns the source text, so it is where errors raised deeper down
//! get their excerpt attached.

use std::{fs, path::Path, sync::Arc};

use tracing::{debug, warn};

use crate::{ast::Document, syntax::Builder, WdlError};

/// Settings fixed for the duration of one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Enforce `?` and array quantifiers strictly. Turning this off lets
    /// older documents through: `T?` is accepted where `T` is expected and
    /// `T` where `Array[T]` is expected.
    pub check_quant: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { check_quant: true }
    }
}

/// Parse and type-check `text`, positioning nodes under `uri`.
pub fn load_source(text: &str, uri: &str, options: LoadOptions) -> Result<Document, WdlError> {
    let source: Arc<str> = Arc::from(text);
    let doc = Builder::new(uri)
        .document(text)
        .and_then(|doc| {
            doc.typecheck(options.check_quant)?;
            Ok(doc)
        })
        .map_err(|e| e.with_source(&source))?;
    debug!(
        uri,
        tasks = doc.tasks.len(),
        check_quant = options.check_quant,
        "loaded document"
    );
    Ok(doc)
}

/// Read and load one document from disk.
pub fn load(path: impl AsRef<Path>, options: LoadOptions) -> Result<Document, WdlError> {
    let path = path.as_ref();
    let uri = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| WdlError::Io {
        uri: uri.clone(),
        source,
    })?;
    load_source(&text, &uri, options)
}

/// Load independent documents, collecting every failure.
///
/// A single failure is returned as is; several are wrapped in
/// `MultipleValidation`, one entry per failing document.
pub fn load_all<P: AsRef<Path>>(paths: &[P], options: LoadOptions) -> Result<Vec<Document>, WdlError> {
    let mut docs = Vec::with_capacity(paths.len());
    let mut errors = Vec::new();
    for path in paths {
        match load(path, options) {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "document failed to load");
                errors.push(e);
            }
        }
    }
    match WdlError::aggregate(errors) {
        Some(err) => Err(err),
        None => Ok(docs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relaxed_mode_accepts_optional_to_required() {
        let text = "task t { input { String? s } String r = s command {} }";
        let strict = load_source(text, "t.wdl", LoadOptions::default()).unwrap_err();
        assert!(strict.is_quantifier_mismatch());
        assert!(strict.excerpt().is_some());
        let relaxed = LoadOptions { check_quant: false };
        assert!(load_source(text, "t.wdl", relaxed).is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load("/nonexistent/doc.wdl", LoadOptions::default()).unwrap_err();
        assert!(matches!(err, WdlError::Io { .. }));
    }
}
