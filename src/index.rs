//! Index builder: batched, ledger-coordinated commits to the index service.
//!
//! Consumes the orchestrator's ordered result stream. Successful results are
//! added to the service and committed every `batch_size` documents; each
//! commit is bracketed by `batch_started` / `batch_committed` ledger entries
//! carrying the batch's canonical key range and count, which is what makes a
//! crash between the two detectable and the batch replayable.

use anyhow::{Context, Result};
use log::{debug, warn};
use serde_json::json;
use std::collections::BTreeMap;

use crate::cache::MetadataCache;
use crate::errors::PipelineError;
use crate::ledger::{EventType, Ledger};
use crate::types::{CanonicalKey, ProcessingResult, ResultStatus};

/// External index service port. `add` must be idempotent keyed by content
/// hash (re-adding a document is a no-op or overwrite); `commit` makes every
/// add since the previous commit durable.
pub trait IndexService {
    fn add(&mut self, key: &CanonicalKey, fields: &BTreeMap<String, String>) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
}

/// Totals accumulated over a run.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuilderTotals {
    pub processed: usize,
    pub failed: usize,
    pub batches_committed: usize,
}

/// Streaming builder over an index service and the audit ledger.
///
/// Owns all commit calls for the run; the ledger handle is borrowed because
/// other stages log through it between batches.
pub struct IndexBuilder<'a, S: IndexService> {
    service: &'a mut S,
    batch_size: usize,
    /// Key range of the open (uncommitted) batch.
    batch_first: Option<CanonicalKey>,
    batch_last: Option<CanonicalKey>,
    batch_count: usize,
    /// Facet fields of the open batch, kept only when a cache is attached.
    batch_facets: Vec<(CanonicalKey, Option<String>, Option<String>)>,
    cache: Option<&'a mut MetadataCache>,
    totals: BuilderTotals,
}

impl<'a, S: IndexService> IndexBuilder<'a, S> {
    pub fn new(service: &'a mut S, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be positive");
        Self {
            service,
            batch_size,
            batch_first: None,
            batch_last: None,
            batch_count: 0,
            batch_facets: Vec::new(),
            cache: None,
            totals: BuilderTotals::default(),
        }
    }

    /// Attach a metadata cache. Each committed batch is inserted into it
    /// incrementally, with the recorded ledger tail advanced in step, so
    /// facet lookups during a run see committed documents without a rebuild.
    pub fn with_cache(mut self, cache: &'a mut MetadataCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn totals(&self) -> BuilderTotals {
        self.totals
    }

    /// Accept the next result in canonical order.
    ///
    /// Failed extractions are recorded in the ledger and never block the
    /// batch; Ok results are added and trigger a commit when the batch fills.
    pub fn accept(&mut self, ledger: &mut Ledger, result: ProcessingResult) -> Result<()> {
        match result.status {
            ResultStatus::Failed(ref reason) => {
                warn!(
                    "{}",
                    PipelineError::ExtractionFailed {
                        path: result.key.path.clone(),
                        reason: reason.clone(),
                    }
                );
                ledger.append(
                    EventType::DocumentFailed,
                    json!({
                        "key": key_json(&result.key),
                        "reason": reason,
                    }),
                )?;
                self.totals.failed += 1;
            }
            ResultStatus::Ok => {
                self.service
                    .add(&result.key, &result.extracted_fields)
                    .with_context(|| format!("add {}", result.key.display()))?;
                if self.batch_first.is_none() {
                    self.batch_first = Some(result.key.clone());
                }
                if self.cache.is_some() {
                    self.batch_facets.push((
                        result.key.clone(),
                        result.extracted_fields.get("custodian").cloned(),
                        result.extracted_fields.get("doctype").cloned(),
                    ));
                }
                self.batch_last = Some(result.key);
                self.batch_count += 1;
                self.totals.processed += 1;
                if self.batch_count >= self.batch_size {
                    self.commit_batch(ledger)?;
                }
            }
        }
        Ok(())
    }

    /// Flush the open partial batch. Call once after the stream ends.
    pub fn finish(&mut self, ledger: &mut Ledger) -> Result<()> {
        if self.batch_count > 0 {
            self.commit_batch(ledger)?;
        }
        Ok(())
    }

    /// Ledger-bracketed commit: `batch_started` is durable before the
    /// service commit runs, so a crash mid-commit leaves the started entry
    /// unmatched and the rerun replays the batch.
    fn commit_batch(&mut self, ledger: &mut Ledger) -> Result<()> {
        let first = self.batch_first.take().context("open batch missing first key")?;
        let last = self.batch_last.take().context("open batch missing last key")?;
        let count = self.batch_count;
        self.batch_count = 0;

        let range = json!({
            "first": key_json(&first),
            "last": key_json(&last),
            "count": count,
        });
        ledger.append(EventType::BatchStarted, range.clone())?;

        self.service.commit().map_err(|e| PipelineError::CommitFailed {
            reason: format!("{:#}", e),
        })?;

        ledger.append(EventType::BatchCommitted, range)?;
        if let Some(cache) = self.cache.as_deref_mut() {
            for (key, custodian, doctype) in self.batch_facets.drain(..) {
                cache.insert(&key, custodian.as_deref(), doctype.as_deref());
            }
            cache.note_tail(ledger.tail_seq());
        }
        self.totals.batches_committed += 1;
        debug!(
            "committed batch of {} ({} .. {})",
            count,
            first.display(),
            last.display()
        );
        Ok(())
    }
}

/// Canonical key as a ledger payload fragment.
pub fn key_json(key: &CanonicalKey) -> serde_json::Value {
    json!({
        "hash": hex::encode(key.content_hash),
        "path": key.path.to_string_lossy(),
    })
}
