//! Worker-pool orchestrator: parallel map over the canonical stream with
//! strictly in-order release.
//!
//! Descriptors are dispatched by canonical position to a fixed pool; the
//! reorder buffer releases completions only when the contiguous prefix is
//! complete, so the caller sees canonical order no matter which worker
//! finishes first. In-flight work is capped at a small multiple of the pool
//! size: when the buffer is full, dispatch stops until the head releases.

use anyhow::Result;
use crossbeam_channel::{RecvTimeoutError, bounded};
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::types::{DocumentDescriptor, ProcessingResult};

use super::processor::DocumentProcessor;
use super::reorder::ReorderBuffer;
use super::workers::{Completed, Job, spawn_process_workers};
use super::PipelineTuning;

/// How the ordered run ended.
#[derive(Clone, Copy, Debug)]
pub struct OrchestratorOutcome {
    /// Results released to the sink, in canonical order.
    pub released: u64,
    /// True when the cancel token stopped dispatch; the sink received the
    /// contiguous prefix completed before cancellation.
    pub cancelled: bool,
}

/// Interval at which the coordinator re-checks the cancel token while
/// blocked waiting for a completion.
const CANCEL_POLL: Duration = Duration::from_millis(200);

/// Feed canonically sorted `descriptors` through the pool and hand each
/// result to `sink` in canonical order.
///
/// `sink` runs on the coordinating thread and is where the index builder
/// plugs in; a sink error aborts the run. Worker failures never do: they
/// surface as `Failed` results, in order, like any other.
pub fn run_ordered<F>(
    descriptors: Vec<DocumentDescriptor>,
    processor: Arc<dyn DocumentProcessor>,
    tuning: &PipelineTuning,
    cancel: Arc<AtomicBool>,
    mut sink: F,
) -> Result<OrchestratorOutcome>
where
    F: FnMut(ProcessingResult) -> Result<()>,
{
    // Both channels sized to the in-flight cap: at most max_in_flight
    // positions are dispatched-but-unreleased, so neither side ever blocks
    // on send and the coordinator cannot deadlock against the pool.
    let (job_tx, job_rx) = bounded::<Job>(tuning.max_in_flight);
    let (done_tx, done_rx) = bounded::<Completed>(tuning.max_in_flight);

    let handles = spawn_process_workers(
        job_rx,
        &done_tx,
        processor,
        tuning.num_workers,
        Arc::clone(&cancel),
    );
    // Workers hold the only remaining senders; channel closes when they exit.
    drop(done_tx);

    let mut jobs = descriptors
        .into_iter()
        .enumerate()
        .map(|(pos, descriptor)| Job {
            pos: pos as u64,
            descriptor,
        });
    let mut next_job = jobs.next();
    let mut buffer = ReorderBuffer::new(tuning.max_in_flight);
    let mut released = 0u64;
    let mut cancelled = false;

    loop {
        while !buffer.is_full() {
            let Some(job) = next_job.take() else { break };
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            buffer.mark_dispatched();
            if job_tx.send(job).is_err() {
                anyhow::bail!("worker pool hung up before dispatch finished");
            }
            next_job = jobs.next();
        }
        if cancelled {
            break;
        }
        if buffer.in_flight() == 0 && next_job.is_none() {
            break;
        }

        match done_rx.recv_timeout(CANCEL_POLL) {
            Ok(done) => {
                buffer.complete(done.pos, done.result);
                while let Some(result) = buffer.pop_ready() {
                    sink(result)?;
                    released += 1;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if cancel.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Stop dispatch; workers exit once the job queue drains (or they see the
    // cancel token between documents).
    drop(job_tx);

    if cancelled {
        // Drain in-flight completions and release the contiguous prefix.
        // Jobs abandoned by cancelled workers leave a gap, so anything past
        // the gap stays unreleased: no partial, ambiguous state leaks out.
        while let Ok(done) = done_rx.recv() {
            buffer.complete(done.pos, done.result);
            while let Some(result) = buffer.pop_ready() {
                sink(result)?;
                released += 1;
            }
        }
        debug!("orchestrator cancelled after releasing {} results", released);
    }

    for h in handles {
        let _ = h.join();
    }

    Ok(OrchestratorOutcome {
        released,
        cancelled,
    })
}
