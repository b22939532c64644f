//! Veridex: deterministic document-discovery pipeline with a tamper-evident
//! audit ledger.
//!
//! The same corpus, processed twice, yields identical index content and an
//! offline-verifiable record that nothing was altered, added, or reordered
//! after the fact. Discovery is lazy and boundary-checked, documents are
//! ordered by the canonical `(content_hash, path)` key, a bounded worker
//! pool processes them with strictly in-order release, and every step lands
//! in an append-only hash-chained ledger before it counts as having
//! happened.

pub mod cache;
pub mod discover;
pub mod engine;
pub mod errors;
pub mod index;
pub mod ledger;
pub mod order;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

use anyhow::Context;
use log::{debug, warn};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Result alias used by public veridex API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

use discover::{DiscoverOutcome, RootBoundary, discover};
use index::{IndexBuilder, IndexService};
use ledger::{EventType, Ledger};
use pipeline::{DocumentProcessor, PipelineTuning, run_ordered};
use serde_json::json;
use utils::config::PackagePaths;

/// Single entry point: discover documents under `root`, process them through
/// `processor` on a worker pool, and build `service` in canonical order,
/// recording every step in `ledger`.
///
/// Per-document failures (boundary escapes, extraction errors) are local:
/// logged, recorded, siblings continue. Ledger durability failures abort the
/// run. On a rerun after a crash the last unconfirmed batch is replayed;
/// index adds are idempotent so the final content matches an uninterrupted
/// run.
pub fn run_pipeline<S: IndexService>(
    root: &Path,
    service: &mut S,
    ledger: &mut Ledger,
    processor: Arc<dyn DocumentProcessor>,
    opts: &Opts,
    cancel: Arc<AtomicBool>,
) -> Result<PipelineReport> {
    if opts.batch_size == 0 {
        anyhow::bail!("batch size must be positive");
    }
    let boundary = RootBoundary::new(root, opts.follow_links)?;
    let tuning = PipelineTuning::for_workers(opts.num_workers);
    debug!(
        "{} CONFIG: root={} workers={} batch={} follow_links={}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        boundary.root().display(),
        tuning.num_workers,
        opts.batch_size,
        opts.follow_links,
    );

    if ledger.has_unconfirmed_batch() {
        log::info!("last batch was started but never committed; replaying from discovery");
    }
    // Worker count stays out of the payload: ledger content must be
    // identical across runs that differ only in scheduling configuration.
    ledger.append(
        EventType::RunStarted,
        json!({
            "root": boundary.root().to_string_lossy(),
            "batch_size": opts.batch_size,
            "follow_links": opts.follow_links,
        }),
    )?;

    let mut exclude = PackagePaths::get().default_exclude_patterns();
    exclude.extend(opts.exclude.iter().cloned());

    let (descriptors, discovery_cancelled) =
        collect_descriptors(&boundary, &exclude, opts, ledger, &cancel)?;

    let mut descriptors = descriptors;
    order::sort_canonical(&mut descriptors);
    debug!("discovered {} documents", descriptors.len());

    let mut builder = IndexBuilder::new(service, opts.batch_size);
    let cancelled = if discovery_cancelled {
        true
    } else {
        let outcome = run_ordered(
            descriptors,
            processor,
            &tuning,
            Arc::clone(&cancel),
            |result| builder.accept(ledger, result),
        )?;
        outcome.cancelled
    };
    // Released results are a clean canonical prefix; commit them so a
    // cancelled run resumes exactly like a crashed one.
    builder.finish(ledger)?;

    let totals = builder.totals();
    let summary = json!({
        "documents_processed": totals.processed,
        "documents_failed": totals.failed,
        "batches_committed": totals.batches_committed,
    });
    if cancelled {
        ledger.append(EventType::RunCancelled, summary)?;
    } else {
        ledger.append(EventType::RunCompleted, summary)?;
    }

    Ok(PipelineReport {
        documents_processed: totals.processed,
        documents_failed: totals.failed,
        final_ledger_seq: ledger
            .tail_seq()
            .context("ledger has no entries after run events")?,
        cancelled,
    })
}

/// Drain the lazy discoverer, recording boundary escapes in the ledger and
/// handling walk errors per strict mode. Returns the (unordered) descriptor
/// set and whether cancellation cut discovery short.
fn collect_descriptors(
    boundary: &RootBoundary,
    exclude: &[String],
    opts: &Opts,
    ledger: &mut Ledger,
    cancel: &AtomicBool,
) -> Result<(Vec<DocumentDescriptor>, bool)> {
    let mut descriptors = Vec::new();
    let mut skipped = 0usize;
    let mut cancelled = false;

    for outcome in discover(boundary, exclude) {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        match outcome {
            DiscoverOutcome::Doc(d) => descriptors.push(d),
            DiscoverOutcome::Escape { path, resolved } => {
                warn!(
                    "{}",
                    errors::PipelineError::PathEscape {
                        path: path.clone(),
                        resolved: resolved.clone(),
                    }
                );
                ledger.append(
                    EventType::PathEscape,
                    json!({
                        "path": path.to_string_lossy(),
                        "resolved": resolved.to_string_lossy(),
                    }),
                )?;
            }
            DiscoverOutcome::Err { msg, path } => {
                let shown = path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<no path>".to_string());
                if opts.strict {
                    anyhow::bail!("strict mode: {} (path: {})", msg, shown);
                }
                warn!("skipping {}: {}", shown, msg);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        warn!("skipped {} paths due to access errors", skipped);
    }
    Ok((descriptors, cancelled))
}
