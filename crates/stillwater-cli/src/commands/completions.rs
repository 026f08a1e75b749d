use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::{generate, generate_to, Shell};

use crate::cli::Cli;
use crate::error::CliError;

const BIN_NAME: &str = "stillwater";

/// Print a completion script, or write it to `output`.
///
/// An existing directory gets a file named after the shell's convention.
pub fn run_completions(shell: Shell, output: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();

    let Some(path) = output else {
        let mut buffer = Vec::new();
        generate(shell, &mut command, BIN_NAME, &mut buffer);
        io::stdout().write_all(&buffer)?;
        return Ok(());
    };

    let written: PathBuf = if path.is_dir() {
        generate_to(shell, &mut command, BIN_NAME, path)?
    } else {
        let mut buffer = Vec::new();
        generate(shell, &mut command, BIN_NAME, &mut buffer);
        std::fs::write(path, &buffer)?;
        path.to_path_buf()
    };
    println!("{}", written.display());
    Ok(())
}
