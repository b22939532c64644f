//! Append-only, hash-chained, durable audit ledger.
//!
//! Single writer: the `Ledger` owns its file handle and every append is
//! serialized through it. `append` does not return until the record is
//! flushed and synced, so a crash immediately after a successful append never
//! loses that entry. Verification is offline and streaming; see
//! [`verify`](crate::ledger::verify).

pub mod entry;
pub mod verify;

pub use entry::{EventType, GENESIS_HASH, LEDGER_FORMAT_VERSION, LedgerEntry};
pub use verify::{VerifyOutcome, verify_ledger, verify_ledger_file};

use anyhow::{Context, Result};
use log::debug;
use rand::RngCore;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::engine::tools::now_ms;
use crate::errors::PipelineError;
use entry::{decode_digest, seal_entry};

/// Ledger lifecycle. Entries may be appended only while `Open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerState {
    Uninitialized,
    Open,
    Closed,
}

/// Open ledger handle: append-only file plus the chain tail and local secret.
pub struct Ledger {
    path: PathBuf,
    file: File,
    state: LedgerState,
    secret: [u8; 32],
    /// Highest appended sequence number; None for an empty ledger.
    tail_seq: Option<u64>,
    /// entry_hash of the tail entry, or the genesis value when empty.
    last_hash: [u8; 32],
    /// True when the existing file ends with a batch_started that has no
    /// matching batch_committed — the batch is not durable in the index.
    unconfirmed_batch: bool,
}

impl Ledger {
    /// Open (or create) the ledger at `path` and move it to `Open`.
    ///
    /// An existing file is scanned once, streaming, to recover the tail
    /// sequence, tail hash, and whether the last batch was left unconfirmed.
    /// The ledger-local secret lives in a sibling `<name>.key` file and is
    /// created on first use.
    pub fn open(path: &Path) -> Result<Self> {
        let secret = load_or_create_secret(&secret_path_for(path))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open ledger {}", path.display()))?;

        let mut tail_seq = None;
        let mut last_hash = GENESIS_HASH;
        let mut unconfirmed_batch = false;
        let reader = BufReader::new(
            File::open(path).with_context(|| format!("read ledger {}", path.display()))?,
        );
        for line in reader.lines() {
            let line = line.context("read ledger line")?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: LedgerEntry = serde_json::from_str(&line).context("parse ledger entry")?;
            last_hash = decode_digest("entry_hash", &entry.entry_hash)?;
            tail_seq = Some(entry.seq);
            match entry.event_type {
                EventType::BatchStarted => unconfirmed_batch = true,
                EventType::BatchCommitted => unconfirmed_batch = false,
                _ => {}
            }
        }
        if let Some(seq) = tail_seq {
            debug!("ledger {} reopened at seq {}", path.display(), seq);
        }
        if unconfirmed_batch {
            log::warn!(
                "ledger {} ends with an unconfirmed batch; rerun will replay it",
                path.display()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            state: LedgerState::Open,
            secret,
            tail_seq,
            last_hash,
            unconfirmed_batch,
        })
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Highest appended sequence number; None when the ledger is empty. Used
    /// by the metadata cache for staleness checks.
    pub fn tail_seq(&self) -> Option<u64> {
        self.tail_seq
    }

    /// True when the file ended (at open) with a batch_started lacking its
    /// batch_committed. The index builder treats that batch as not durable.
    pub fn has_unconfirmed_batch(&self) -> bool {
        self.unconfirmed_batch
    }

    /// Append one event and force it durable before returning.
    ///
    /// Any write, flush, or sync failure is fatal to the operation: the
    /// caller must not proceed as though the event occurred.
    pub fn append(&mut self, event_type: EventType, payload: serde_json::Value) -> Result<LedgerEntry> {
        if self.state != LedgerState::Open {
            anyhow::bail!("ledger is not open (state {:?})", self.state);
        }
        let seq = self.tail_seq.map_or(0, |s| s + 1);
        let (entry, entry_hash) = seal_entry(
            &self.secret,
            &self.last_hash,
            seq,
            now_ms(),
            event_type,
            payload,
        )?;
        let line = serde_json::to_string(&entry).context("serialize ledger entry")?;

        write_durable(&mut self.file, &line).map_err(|e| PipelineError::LedgerWriteFailed {
            reason: format!("{} ({})", e, self.path.display()),
        })?;

        self.tail_seq = Some(seq);
        self.last_hash = entry_hash;
        match event_type {
            EventType::BatchStarted => self.unconfirmed_batch = true,
            EventType::BatchCommitted => self.unconfirmed_batch = false,
            _ => {}
        }
        Ok(entry)
    }

    /// Verify the chain of this ledger's file from `from_seq`.
    pub fn verify(&self, from_seq: u64) -> Result<VerifyOutcome> {
        verify_ledger(&self.path, &self.secret, from_seq)
    }

    /// Move to `Closed`. Further appends fail.
    pub fn close(&mut self) {
        self.state = LedgerState::Closed;
    }
}

/// Write one record line and force it to storage. The entry counts as
/// appended only once the sync returns.
fn write_durable(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    file.sync_all()
}

/// Sibling key file for a ledger path (`audit.ndjson` → `audit.ndjson.key`).
pub fn secret_path_for(ledger_path: &Path) -> PathBuf {
    let name = ledger_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_string());
    ledger_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!("{name}.key"))
}

/// Load the hex-encoded 32-byte secret, generating one on first use.
pub fn load_or_create_secret(key_path: &Path) -> Result<[u8; 32]> {
    if key_path.exists() {
        let text = std::fs::read_to_string(key_path)
            .with_context(|| format!("read ledger key {}", key_path.display()))?;
        return decode_digest("ledger key", text.trim());
    }
    let mut secret = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    std::fs::write(key_path, hex::encode(secret))
        .with_context(|| format!("write ledger key {}", key_path.display()))?;
    Ok(secret)
}
