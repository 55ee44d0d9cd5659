//! The `wdlcheck` command-line interface.
//!
//! Every failure is printed to stderr and exits with status 2.

use std::{
    io::{self, Write},
    path::Path,
    process,
};

use clap::Parser;
use termcolor::{ColorChoice, StandardStream};
use thiserror::Error;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{
        args::{Command, WdlArgs},
        inputs::InputError,
    },
    loader::{load, LoadOptions},
    WdlError,
};

pub mod args;
pub mod diagnostics;
pub mod inputs;
pub mod outline;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Wdl(#[from] WdlError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub fn run() {
    let args = WdlArgs::parse();
    let language = args.command.language().clone();
    init_tracing(language.debug);
    debug!(?args, "parsed arguments");

    let result = match &args.command {
        Command::Check { uri, .. } => check(uri, language.load_options()),
        Command::Ast { uri, .. } => ast(uri, language.load_options()),
        Command::Inputs {
            uri,
            task,
            inputs,
            input,
            empty,
            ..
        } => bind(
            uri,
            task.as_deref(),
            input.as_deref(),
            inputs,
            empty,
            language.load_options(),
        ),
    };

    if let Err(err) = result {
        let mut stderr = StandardStream::stderr(ColorChoice::Auto);
        let _ = match &err {
            CliError::Wdl(e) => diagnostics::report(&mut stderr, e, language.check_quant),
            other => writeln!(stderr, "{}", other),
        };
        process::exit(2);
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

// ============================================================================
// SUBCOMMANDS
// ============================================================================

/// Outline each document as it loads; failures are reported together after.
fn check<P: AsRef<Path>>(uris: &[P], options: LoadOptions) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    let mut errors = Vec::new();
    for uri in uris {
        let uri = uri.as_ref();
        match load(uri, options) {
            Ok(doc) => {
                let name = uri.file_name().unwrap_or(uri.as_os_str());
                writeln!(stdout, "{}", name.to_string_lossy())?;
                outline::print_outline(&mut stdout, &doc, 0)?;
            }
            Err(err) => {
                warn!(path = %uri.display(), error = %err, "document failed to load");
                errors.push(err);
            }
        }
    }
    stdout.flush()?;
    match WdlError::aggregate(errors) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn ast(uri: &Path, options: LoadOptions) -> Result<(), CliError> {
    let doc = load(uri, options)?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

fn bind(
    uri: &Path,
    task: Option<&str>,
    input: Option<&str>,
    pairs: &[String],
    empty: &[String],
    options: LoadOptions,
) -> Result<(), CliError> {
    let doc = load(uri, options)?;
    let target = inputs::resolve_target(&doc, task)?;
    let json = match input {
        Some(arg) => inputs::read_input_json(arg)?,
        None => serde_json::Map::new(),
    };
    let decls = inputs::bind_inputs(target, &json, pairs, empty)?;
    debug!(task = %target.name, bound = decls.len(), "bound inputs");
    let mut stdout = io::stdout().lock();
    for decl in decls {
        writeln!(stdout, "{}", decl)?;
    }
    Ok(())
}
