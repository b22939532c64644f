//! Typed error kinds callers match on. Everything else uses anyhow context.

use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error kinds with distinct handling policies.
///
/// Per-document kinds (`PathEscape`, `ExtractionFailed`) are local: logged,
/// recorded in the ledger, siblings continue. Durability kinds
/// (`LedgerWriteFailed`, `LedgerTampered`) are fatal to the run — the audit
/// guarantee depends on every event being either fully durable or never
/// reported as written. `CommitFailed` leaves the ledger showing a batch
/// started but not committed, which a rerun replays.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A discovered entry resolved outside the configured root boundary.
    #[error("path escapes root boundary: {} (resolved to {})", .path.display(), .resolved.display())]
    PathEscape { path: PathBuf, resolved: PathBuf },

    /// Per-document processing failure; recorded as a Failed result.
    #[error("extraction failed for {}: {reason}", .path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// Index service commit failed; the batch is not durable and is safe to
    /// replay on rerun.
    #[error("index commit failed: {reason}")]
    CommitFailed { reason: String },

    /// Ledger write or sync failed; durability cannot be asserted.
    #[error("ledger write failed: {reason}")]
    LedgerWriteFailed { reason: String },

    /// Chain verification found a divergence. Never auto-repaired.
    #[error("ledger tampered at seq {at_seq}: {reason}")]
    LedgerTampered { at_seq: u64, reason: String },
}
