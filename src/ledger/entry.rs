//! Ledger record layout, canonical serialization, and chain hashing.
//!
//! Each record is one line of JSON, self-describing via an explicit `version`
//! field so an independent verifier can keep reading old entries as fields
//! are added. The chain digest covers `prev_hash ‖ canonical_json(version,
//! seq, timestamp_ms, event_type, payload)`; the keyed MAC covers the digest.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Current on-disk record schema version.
pub const LEDGER_FORMAT_VERSION: u32 = 1;

/// Fixed hash entry 0 chains from.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Audit event kinds. Serialized as snake_case strings so the ledger file
/// reads without this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStarted,
    RunCompleted,
    RunCancelled,
    PathEscape,
    DocumentFailed,
    BatchStarted,
    BatchCommitted,
}

/// One appended record. `seq` is contiguous from 0; `prev_hash` of entry n
/// equals `entry_hash` of entry n-1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub version: u32,
    pub seq: u64,
    pub timestamp_ms: i64,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    /// Hex digest of the previous entry (genesis value for entry 0).
    pub prev_hash: String,
    /// Hex blake3 of `prev_hash_bytes ‖ canonical body json`.
    pub entry_hash: String,
    /// Hex HMAC-SHA256 of `entry_hash` bytes under the ledger-local secret.
    pub hmac: String,
}

/// The hashed portion of an entry, serialized with fixed field order.
/// `payload` maps are BTreeMap-backed (serde_json default), so
/// re-serialization after a parse round-trip is byte-identical.
#[derive(Serialize)]
struct EntryBody<'a> {
    version: u32,
    seq: u64,
    timestamp_ms: i64,
    event_type: EventType,
    payload: &'a serde_json::Value,
}

/// Canonical serialization of the hashed fields. `version` is covered so a
/// rewritten schema version breaks the chain like any other edit.
pub fn canonical_body(
    version: u32,
    seq: u64,
    timestamp_ms: i64,
    event_type: EventType,
    payload: &serde_json::Value,
) -> Result<Vec<u8>> {
    serde_json::to_vec(&EntryBody {
        version,
        seq,
        timestamp_ms,
        event_type,
        payload,
    })
    .context("serialize entry body")
}

/// Chain digest: blake3 over the raw previous hash followed by the body.
pub fn compute_entry_hash(prev_hash: &[u8; 32], body: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev_hash);
    hasher.update(body);
    *hasher.finalize().as_bytes()
}

/// Keyed MAC over the chain digest. A 32-byte key is always a valid HMAC key.
pub fn compute_entry_hmac(secret: &[u8; 32], entry_hash: &[u8; 32]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key size is always valid");
    mac.update(entry_hash);
    let bytes = mac.finalize().into_bytes();
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    out
}

/// Build a fully chained entry from its fields and the previous hash.
pub fn seal_entry(
    secret: &[u8; 32],
    prev_hash: &[u8; 32],
    seq: u64,
    timestamp_ms: i64,
    event_type: EventType,
    payload: serde_json::Value,
) -> Result<(LedgerEntry, [u8; 32])> {
    let body = canonical_body(LEDGER_FORMAT_VERSION, seq, timestamp_ms, event_type, &payload)?;
    let entry_hash = compute_entry_hash(prev_hash, &body);
    let hmac = compute_entry_hmac(secret, &entry_hash);
    let entry = LedgerEntry {
        version: LEDGER_FORMAT_VERSION,
        seq,
        timestamp_ms,
        event_type,
        payload,
        prev_hash: hex::encode(prev_hash),
        entry_hash: hex::encode(entry_hash),
        hmac: hex::encode(hmac),
    };
    Ok((entry, entry_hash))
}

/// Decode a hex digest field into raw bytes; errors name the field.
pub fn decode_digest(field: &str, hex_str: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_str).with_context(|| format!("decode {field}"))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("{field} is not 32 bytes"))?;
    Ok(arr)
}
