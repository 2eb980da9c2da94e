//! `scena completions`: shell completion scripts.

use clap::{Args, Command};
use clap_complete::{Shell, generate};
use std::io::Write;

const BIN_NAME: &str = "scena";

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate for.
    #[arg(value_enum)]
    pub shell: Shell,
}

fn write_completions(shell: Shell, command: &mut Command, out: &mut dyn Write) {
    generate(shell, command, BIN_NAME, out);
}

/// Print the completion script for `args.shell`.
///
/// # Errors
///
/// Returns an error if stdout cannot be flushed.
pub fn run_completions(args: &CompletionsArgs, command: &mut Command) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_completions(args.shell, command, &mut out);
    out.flush()?;
    Ok(())
}
