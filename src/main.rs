//! # stackctl CLI
//!
//! Binary entry point for the `stackctl` command-line tool.
//!
//! Parses arguments with `clap`, runs the selected command and exits with
//! the number of failures recorded during the run. Fatal errors (settings
//! that cannot be loaded, manifests that cannot be written) print the error
//! chain and exit with 1.
//!
//! The logic lives in the `stackctl` library crate; the binary is a thin
//! wrapper around it.

mod cli;
mod commands;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    let code = match cli.execute() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
