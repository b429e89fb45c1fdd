//! Command-line interface.

pub mod completions;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::core::delegate::{GpgCli, SopsCli};
use crate::core::document::ResourceList;
use crate::core::processor;
use crate::error::Result;

/// Warren - Update KSOPS encrypted secrets from a kpt ResourceList.
#[derive(Parser)]
#[command(
    name = "warren",
    about = "Update KSOPS encrypted secrets from a kpt ResourceList",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Read the ResourceList from a file instead of stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Write the updated ResourceList to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Top-level commands.
///
/// Without a subcommand warren runs as a KRM function: it reads a
/// ResourceList from stdin or `--input` and writes the updated list to
/// stdout or `--output`.
#[derive(Subcommand)]
pub enum Command {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Execute a command. Returns the process exit code.
pub fn execute(cli: Cli) -> Result<i32> {
    match cli.command {
        Some(Command::Completions { shell }) => {
            completions::execute(shell)?;
            Ok(0)
        }
        None => invoke(cli.input.as_deref(), cli.output.as_deref()),
    }
}

/// One function invocation: ResourceList in, updated ResourceList out.
///
/// The list is read from `input` when given, stdin otherwise, and written
/// to `output` when given, stdout otherwise. The exit code mirrors the run
/// report — non-zero only when an error severity result was recorded. The
/// updated list is written out either way so callers always see the
/// diagnostics.
fn invoke(input: Option<&Path>, output: Option<&Path>) -> Result<i32> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let mut list = ResourceList::parse(&text)?;
    let report = processor::run(&mut list, &SopsCli, &GpgCli);

    let rendered = list.to_yaml()?;
    match output {
        Some(path) => std::fs::write(path, rendered)?,
        None => std::io::stdout().write_all(rendered.as_bytes())?,
    }

    debug!(results = list.results.len(), "run complete");
    Ok(report.exit_code())
}
