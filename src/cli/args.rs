//! Command-line arguments and subcommands.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::loader::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "wdlcheck",
    version,
    about = "Parse and statically check WDL task documents."
)]
pub struct WdlArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand that loads documents.
#[derive(Debug, Clone, Args)]
pub struct LanguageArgs {
    /// Relax static type checking of optional (?) and nonempty (+) quantifiers.
    #[arg(long = "no-quant-check", action = ArgAction::SetFalse)]
    pub check_quant: bool,
    /// Log loader activity to stderr.
    #[arg(long)]
    pub debug: bool,
}

impl LanguageArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            check_quant: self.check_quant,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and type-check documents, then print an outline of each.
    Check {
        /// Paths of the documents to check.
        #[arg(required = true)]
        uri: Vec<PathBuf>,
        #[command(flatten)]
        language: LanguageArgs,
    },
    /// Print a checked document's syntax tree as JSON.
    Ast {
        uri: PathBuf,
        #[command(flatten)]
        language: LanguageArgs,
    },
    /// Bind command-line inputs to a task and print the result.
    Inputs {
        uri: PathBuf,
        /// Task to target when the document has several.
        #[arg(long)]
        task: Option<String>,
        /// Inputs as NAME=VALUE; array inputs may repeat.
        inputs: Vec<String>,
        /// Inputs JSON object: inline text, `-` for stdin, or a file path.
        #[arg(short, long, value_name = "JSON")]
        input: Option<String>,
        /// Set an array input to the empty array.
        #[arg(long, value_name = "NAME")]
        empty: Vec<String>,
        #[command(flatten)]
        language: LanguageArgs,
    },
}

impl Command {
    pub fn language(&self) -> &LanguageArgs {
        match self {
            Command::Check { language, .. }
            | Command::Ast { language, .. }
            | Command::Inputs { language, .. } => language,
        }
    }
}
