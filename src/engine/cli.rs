//! CLI command handlers: run the pipeline or verify a ledger offline.

use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Opts;
use crate::engine::arg_parser::{Cli, Command, index_path_for, ledger_path_for};
use crate::engine::db_ops::{SqliteIndex, open_db};
use crate::ledger::{Ledger, VerifyOutcome, verify_ledger_file};
use crate::pipeline::FieldExtractor;
use crate::utils::setup_logging;

/// Dispatch the parsed command.
pub fn handle_run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Run {
            dir,
            index,
            ledger,
            workers,
            batch_size,
            follow_links,
            exclude,
            strict,
            verbose,
        } => {
            setup_logging(*verbose);
            let opts = Opts {
                num_workers: *workers,
                batch_size: batch_size
                    .unwrap_or(crate::utils::config::DEFAULT_BATCH_COMMIT_SIZE),
                follow_links: *follow_links,
                exclude: exclude.clone(),
                strict: *strict,
                verbose: *verbose,
            };
            run_command(dir, index_path_for(dir, index), ledger_path_for(dir, ledger), &opts)
        }
        Command::Verify {
            ledger,
            from,
            verbose,
        } => {
            setup_logging(*verbose);
            verify_command(ledger, *from)
        }
    }
}

fn run_command(
    dir: &std::path::Path,
    index_path: PathBuf,
    ledger_path: PathBuf,
    opts: &Opts,
) -> Result<()> {
    let mut ledger = Ledger::open(&ledger_path)?;
    let conn = open_db(&index_path)?;
    let mut service = SqliteIndex::new(conn);

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    // The extractor derives custodian from the path under the canonical
    // root, so both sides must agree on the root's spelling.
    let root = dir
        .canonicalize()
        .with_context(|| format!("canonicalize root {}", dir.display()))?;
    let processor = Arc::new(FieldExtractor::new(&root));
    let report = crate::run_pipeline(&root, &mut service, &mut ledger, processor, opts, cancel)?;
    ledger.close();

    info!(
        "processed {} documents ({} failed), ledger tail seq {}{}",
        report.documents_processed,
        report.documents_failed,
        report.final_ledger_seq,
        if report.cancelled { " [cancelled]" } else { "" },
    );
    if report.cancelled {
        anyhow::bail!("run cancelled; committed prefix is resumable");
    }
    Ok(())
}

fn verify_command(ledger_path: &std::path::Path, from: u64) -> Result<()> {
    match verify_ledger_file(ledger_path, from)? {
        VerifyOutcome::Ok { entries } => {
            info!("ledger ok: {} entries verified", entries);
            Ok(())
        }
        VerifyOutcome::Tampered { at_seq, reason } => Err(crate::errors::PipelineError::LedgerTampered {
            at_seq,
            reason,
        }
        .into()),
    }
}
