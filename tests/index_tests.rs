//! Index builder tests: batch commits bracketed by ledger entries, failed
//! results recorded without blocking, commit failure leaves a replayable tail.

use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use veridex::cache::{Facet, MetadataCache};
use veridex::engine::db_ops::{SqliteIndex, document_count, open_db_in_memory};
use veridex::index::{IndexBuilder, IndexService};
use veridex::ledger::{EventType, Ledger, LedgerEntry};
use veridex::types::{CanonicalKey, ProcessingResult, ResultStatus};

fn ok_result(hash_byte: u8, path: &str) -> ProcessingResult {
    let mut fields = BTreeMap::new();
    fields.insert("custodian".to_string(), "alice".to_string());
    fields.insert("doctype".to_string(), "txt".to_string());
    ProcessingResult {
        key: CanonicalKey {
            content_hash: [hash_byte; 32],
            path: PathBuf::from(path),
        },
        extracted_fields: fields,
        status: ResultStatus::Ok,
    }
}

fn failed_result(hash_byte: u8, path: &str) -> ProcessingResult {
    ProcessingResult {
        key: CanonicalKey {
            content_hash: [hash_byte; 32],
            path: PathBuf::from(path),
        },
        extracted_fields: BTreeMap::new(),
        status: ResultStatus::Failed("no text layer".to_string()),
    }
}

fn ledger_events(path: &std::path::Path) -> Vec<EventType> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<LedgerEntry>(l).unwrap().event_type)
        .collect()
}

#[test]
fn test_batches_bracketed_in_ledger() {
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("audit");
    let mut ledger = Ledger::open(&ledger_path).unwrap();
    let mut service = SqliteIndex::new(open_db_in_memory().unwrap());

    let mut builder = IndexBuilder::new(&mut service, 2);
    for i in 1..=5u8 {
        builder
            .accept(&mut ledger, ok_result(i, &format!("/c/{i}.txt")))
            .unwrap();
    }
    builder.finish(&mut ledger).unwrap();

    let totals = builder.totals();
    assert_eq!(totals.processed, 5);
    assert_eq!(totals.failed, 0);
    // 2 + 2 + trailing 1
    assert_eq!(totals.batches_committed, 3);

    assert_eq!(
        ledger_events(&ledger_path),
        vec![
            EventType::BatchStarted,
            EventType::BatchCommitted,
            EventType::BatchStarted,
            EventType::BatchCommitted,
            EventType::BatchStarted,
            EventType::BatchCommitted,
        ]
    );
    assert_eq!(document_count(service.connection()).unwrap(), 5);
}

#[test]
fn test_batch_payload_carries_key_range() {
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("audit");
    let mut ledger = Ledger::open(&ledger_path).unwrap();
    let mut service = SqliteIndex::new(open_db_in_memory().unwrap());

    let mut builder = IndexBuilder::new(&mut service, 10);
    builder.accept(&mut ledger, ok_result(1, "/c/a.txt")).unwrap();
    builder.accept(&mut ledger, ok_result(2, "/c/b.txt")).unwrap();
    builder.finish(&mut ledger).unwrap();

    let text = fs::read_to_string(&ledger_path).unwrap();
    let started: LedgerEntry = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(started.event_type, EventType::BatchStarted);
    assert_eq!(started.payload["count"], json!(2));
    assert_eq!(started.payload["first"]["path"], json!("/c/a.txt"));
    assert_eq!(started.payload["last"]["path"], json!("/c/b.txt"));
}

#[test]
fn test_failed_results_recorded_but_do_not_block() {
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("audit");
    let mut ledger = Ledger::open(&ledger_path).unwrap();
    let mut service = SqliteIndex::new(open_db_in_memory().unwrap());

    let mut builder = IndexBuilder::new(&mut service, 2);
    builder.accept(&mut ledger, ok_result(1, "/c/a.txt")).unwrap();
    builder
        .accept(&mut ledger, failed_result(2, "/c/scan.tif"))
        .unwrap();
    builder.accept(&mut ledger, ok_result(3, "/c/b.txt")).unwrap();
    builder.finish(&mut ledger).unwrap();

    let totals = builder.totals();
    assert_eq!(totals.processed, 2);
    assert_eq!(totals.failed, 1);
    assert_eq!(document_count(service.connection()).unwrap(), 2);

    let events = ledger_events(&ledger_path);
    assert!(events.contains(&EventType::DocumentFailed));
    assert!(events.contains(&EventType::BatchCommitted));
}

#[test]
fn test_attached_cache_updated_on_commit() {
    let dir = TempDir::new().unwrap();
    let mut ledger = Ledger::open(&dir.path().join("audit")).unwrap();
    let mut service = SqliteIndex::new(open_db_in_memory().unwrap());
    let mut cache = MetadataCache::new();

    {
        let mut builder = IndexBuilder::new(&mut service, 2).with_cache(&mut cache);
        builder.accept(&mut ledger, ok_result(1, "/c/a.txt")).unwrap();
        builder.accept(&mut ledger, ok_result(2, "/c/b.txt")).unwrap();
        builder.accept(&mut ledger, ok_result(3, "/c/c.txt")).unwrap();
        builder.finish(&mut ledger).unwrap();
    }

    // Both batches landed incrementally: no rebuild happened, the recorded
    // tail tracks the ledger, and lookups see every committed key.
    assert_eq!(cache.generation(), 0);
    assert!(!cache.is_stale(ledger.tail_seq()));
    let alice = cache
        .lookup(
            service.connection(),
            ledger.tail_seq(),
            Facet::Custodian,
            "alice",
        )
        .unwrap();
    assert_eq!(alice.len(), 3);
    assert!(alice.contains(&CanonicalKey {
        content_hash: [3; 32],
        path: PathBuf::from("/c/c.txt"),
    }));
}

#[test]
fn test_re_add_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut ledger = Ledger::open(&dir.path().join("audit")).unwrap();
    let mut service = SqliteIndex::new(open_db_in_memory().unwrap());

    for _ in 0..2 {
        let mut builder = IndexBuilder::new(&mut service, 2);
        builder.accept(&mut ledger, ok_result(1, "/c/a.txt")).unwrap();
        builder.accept(&mut ledger, ok_result(2, "/c/b.txt")).unwrap();
        builder.finish(&mut ledger).unwrap();
    }
    assert_eq!(document_count(service.connection()).unwrap(), 2);
}

/// Index service whose commit always fails, standing in for an unreachable
/// search backend.
struct BrokenCommit;

impl IndexService for BrokenCommit {
    fn add(&mut self, _key: &CanonicalKey, _fields: &BTreeMap<String, String>) -> Result<()> {
        Ok(())
    }
    fn commit(&mut self) -> Result<()> {
        anyhow::bail!("index service unreachable")
    }
}

#[test]
fn test_commit_failure_leaves_unconfirmed_batch() {
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("audit");
    {
        let mut ledger = Ledger::open(&ledger_path).unwrap();
        let mut service = BrokenCommit;
        let mut builder = IndexBuilder::new(&mut service, 1);
        let err = builder
            .accept(&mut ledger, ok_result(1, "/c/a.txt"))
            .unwrap_err();
        assert!(err.to_string().contains("commit failed"), "err: {err:#}");
    }

    // The ledger shows batch_started without batch_committed; a rerun sees
    // the batch as not durable and replays it.
    let events = ledger_events(&ledger_path);
    assert_eq!(events, vec![EventType::BatchStarted]);
    let ledger = Ledger::open(&ledger_path).unwrap();
    assert!(ledger.has_unconfirmed_batch());
}
