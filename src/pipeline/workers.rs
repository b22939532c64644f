//! Fixed worker pool: recv job, process document, send completion.

use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::order::order_key;
use crate::types::{DocumentDescriptor, ProcessingResult, ResultStatus};

use super::processor::DocumentProcessor;

/// One unit of dispatched work: canonical position plus the descriptor.
pub struct Job {
    pub pos: u64,
    pub descriptor: DocumentDescriptor,
}

/// A finished unit, in whatever order workers complete.
pub struct Completed {
    pub pos: u64,
    pub result: ProcessingResult,
}

/// Worker loop: the cancel token is checked between documents, never
/// mid-document, so a cancelled run has no partially-processed results.
/// A processing error becomes a `Failed` result and the worker moves on;
/// sibling workers are never aborted.
fn process_worker_loop(
    job_rx: Receiver<Job>,
    done_tx: Sender<Completed>,
    processor: Arc<dyn DocumentProcessor>,
    cancel: Arc<AtomicBool>,
) {
    while let Ok(job) = job_rx.recv() {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let result = process_one(processor.as_ref(), &job.descriptor);
        if done_tx
            .send(Completed {
                pos: job.pos,
                result,
            })
            .is_err()
        {
            break;
        }
    }
    drop(done_tx);
}

/// Run one descriptor through the processor, mapping errors to `Failed`.
pub fn process_one(
    processor: &dyn DocumentProcessor,
    descriptor: &DocumentDescriptor,
) -> ProcessingResult {
    let key = match order_key(descriptor) {
        Ok(key) => key,
        Err(err) => {
            // Malformed descriptor; still produce an in-order result.
            return ProcessingResult {
                key: crate::types::CanonicalKey {
                    content_hash: descriptor.content_hash,
                    path: descriptor.path.clone(),
                },
                extracted_fields: Default::default(),
                status: ResultStatus::Failed(format!("{:#}", err)),
            };
        }
    };
    match processor.process(descriptor) {
        Ok(extracted_fields) => ProcessingResult {
            key,
            extracted_fields,
            status: ResultStatus::Ok,
        },
        Err(err) => ProcessingResult {
            key,
            extracted_fields: Default::default(),
            status: ResultStatus::Failed(format!("{:#}", err)),
        },
    }
}

/// Spawn the pool. Caller must drop its `done_tx` clone after this so the
/// receive side sees channel close once all workers exit.
pub fn spawn_process_workers(
    job_rx: Receiver<Job>,
    done_tx: &Sender<Completed>,
    processor: Arc<dyn DocumentProcessor>,
    num_workers: usize,
    cancel: Arc<AtomicBool>,
) -> Vec<JoinHandle<()>> {
    (0..num_workers)
        .map(|_| {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let processor = Arc::clone(&processor);
            let cancel = Arc::clone(&cancel);
            thread::spawn(move || process_worker_loop(job_rx, done_tx, processor, cancel))
        })
        .collect()
}
