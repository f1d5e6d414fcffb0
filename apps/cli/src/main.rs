//! stagechain CLI: drives the staged pipeline engine over sample or file input.
//!
//! Wires the standard stages into structured, delimited, and sentinel
//! pipelines and dispatches records through them under a capacity budget.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
