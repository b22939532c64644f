//! Orchestrator tests: in-order release, failure isolation, cancellation.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use veridex::pipeline::{DocumentProcessor, PipelineTuning, run_ordered};
use veridex::types::{CanonicalKey, DocumentDescriptor, ResultStatus};

fn descriptor(hash_byte: u8, path: &str) -> DocumentDescriptor {
    DocumentDescriptor {
        path: PathBuf::from(path),
        content_hash: [hash_byte; 32],
        size: 1,
        discovered_at: 0,
    }
}

fn sorted(mut docs: Vec<DocumentDescriptor>) -> Vec<DocumentDescriptor> {
    veridex::order::sort_canonical(&mut docs);
    docs
}

fn tuning(workers: usize) -> PipelineTuning {
    PipelineTuning {
        num_workers: workers,
        max_in_flight: workers * 4,
    }
}

/// Sleeps longest for the canonically-first document, so later positions
/// finish first and the reorder buffer has to do real work.
struct InvertedDelay;

impl DocumentProcessor for InvertedDelay {
    fn process(&self, d: &DocumentDescriptor) -> Result<BTreeMap<String, String>> {
        let delay = 60u64.saturating_sub(d.content_hash[0] as u64 * 20);
        std::thread::sleep(Duration::from_millis(delay));
        let mut fields = BTreeMap::new();
        fields.insert("hash0".to_string(), d.content_hash[0].to_string());
        Ok(fields)
    }
}

struct FailOn(&'static str);

impl DocumentProcessor for FailOn {
    fn process(&self, d: &DocumentDescriptor) -> Result<BTreeMap<String, String>> {
        if d.path.ends_with(self.0) {
            anyhow::bail!("simulated extraction failure");
        }
        Ok(BTreeMap::new())
    }
}

struct NoOp;

impl DocumentProcessor for NoOp {
    fn process(&self, _d: &DocumentDescriptor) -> Result<BTreeMap<String, String>> {
        std::thread::sleep(Duration::from_millis(2));
        Ok(BTreeMap::new())
    }
}

// One worker finishes h2 before another finishes h1; the sink still
// receives h1 first.
#[test]
fn test_release_order_is_canonical_despite_completion_order() {
    let docs = sorted(vec![
        descriptor(2, "/corpus/a.txt"),
        descriptor(1, "/corpus/b.txt"),
        descriptor(3, "/corpus/a.txt"),
    ]);
    let mut released: Vec<CanonicalKey> = Vec::new();
    let outcome = run_ordered(
        docs,
        Arc::new(InvertedDelay),
        &tuning(2),
        Arc::new(AtomicBool::new(false)),
        |r| {
            released.push(r.key.clone());
            Ok(())
        },
    )
    .unwrap();

    assert!(!outcome.cancelled);
    assert_eq!(outcome.released, 3);
    let hashes: Vec<u8> = released.iter().map(|k| k.content_hash[0]).collect();
    assert_eq!(hashes, vec![1, 2, 3]);
    assert_eq!(released[0].path, PathBuf::from("/corpus/b.txt"));
}

#[test]
fn test_identical_release_sequence_across_worker_counts() {
    let mut docs = Vec::new();
    for i in 0..40u8 {
        docs.push(descriptor(i.wrapping_mul(7) % 40, &format!("/d/{i}.txt")));
    }
    let docs = sorted(docs);

    let run = |workers: usize| {
        let mut keys = Vec::new();
        run_ordered(
            docs.clone(),
            Arc::new(NoOp),
            &tuning(workers),
            Arc::new(AtomicBool::new(false)),
            |r| {
                keys.push(r.key.clone());
                Ok(())
            },
        )
        .unwrap();
        keys
    };

    assert_eq!(run(1), run(4));
}

#[test]
fn test_worker_failure_is_isolated_and_in_order() {
    let docs = sorted(vec![
        descriptor(1, "/c/ok1.txt"),
        descriptor(2, "/c/bad.txt"),
        descriptor(3, "/c/ok2.txt"),
    ]);
    let mut statuses = Vec::new();
    run_ordered(
        docs,
        Arc::new(FailOn("bad.txt")),
        &tuning(2),
        Arc::new(AtomicBool::new(false)),
        |r| {
            statuses.push((r.key.content_hash[0], r.status.clone()));
            Ok(())
        },
    )
    .unwrap();

    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses[0].0, 1);
    assert_eq!(statuses[0].1, ResultStatus::Ok);
    assert!(matches!(statuses[1].1, ResultStatus::Failed(_)));
    assert_eq!(statuses[2].1, ResultStatus::Ok);
}

#[test]
fn test_cancellation_returns_ordered_prefix() {
    let mut docs = Vec::new();
    for i in 0..60u8 {
        docs.push(descriptor(i, &format!("/c/{i:03}.txt")));
    }
    let docs = sorted(docs);
    let expected: Vec<CanonicalKey> = docs
        .iter()
        .map(|d| CanonicalKey {
            content_hash: d.content_hash,
            path: d.path.clone(),
        })
        .collect();

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_from_sink = Arc::clone(&cancel);
    let mut released = Vec::new();
    let outcome = run_ordered(
        docs,
        Arc::new(NoOp),
        &tuning(3),
        Arc::clone(&cancel),
        |r| {
            released.push(r.key.clone());
            if released.len() == 5 {
                cancel_from_sink.store(true, Ordering::Relaxed);
            }
            Ok(())
        },
    )
    .unwrap();

    assert!(outcome.cancelled);
    assert!(released.len() >= 5);
    assert!(released.len() < 60, "cancel should cut the run short");
    // The released results are exactly the canonical prefix.
    assert_eq!(released.as_slice(), &expected[..released.len()]);
}

#[test]
fn test_sink_error_aborts_run() {
    let docs = sorted(vec![descriptor(1, "/c/a"), descriptor(2, "/c/b")]);
    let err = run_ordered(
        docs,
        Arc::new(NoOp),
        &tuning(2),
        Arc::new(AtomicBool::new(false)),
        |_r| anyhow::bail!("sink rejected result"),
    )
    .unwrap_err();
    assert!(err.to_string().contains("sink rejected"));
}
