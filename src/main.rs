//! Veridex CLI: run the document pipeline, or verify an audit ledger offline.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use veridex::engine::arg_parser::Cli;
use veridex::engine::handle_run;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
