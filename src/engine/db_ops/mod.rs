//! SQLite-backed reference index service and facet queries.
//!
//! Adds are buffered in memory and written in a single transaction on
//! `commit`, so an uncommitted batch is simply absent after a crash — which
//! is exactly the durability contract the ledger's batch bracketing records.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::index::IndexService;
use crate::types::CanonicalKey;

/// Index schema. Primary key (content_hash, path) makes re-adds idempotent.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    content_hash TEXT NOT NULL,
    path         TEXT NOT NULL,
    custodian    TEXT,
    doctype      TEXT,
    fields       TEXT NOT NULL,
    PRIMARY KEY (content_hash, path)
);
CREATE INDEX IF NOT EXISTS idx_documents_custodian ON documents(custodian);
CREATE INDEX IF NOT EXISTS idx_documents_doctype ON documents(doctype);
";

pub const WAL_PRAGMAS: &str = "
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
";

const INSERT_DOCUMENT_SQL: &str = "INSERT OR REPLACE INTO documents \
    (content_hash, path, custodian, doctype, fields) VALUES (?1, ?2, ?3, ?4, ?5)";

/// Open or create the index DB and ensure schema + WAL with optimizations.
pub fn open_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).context("open database")?;
    conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
        .context("enable WAL")?;
    conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}

/// Open an in-memory DB with the same schema (tests; no WAL pragmas needed).
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    conn.execute_batch(SCHEMA).context("create schema")?;
    Ok(conn)
}

/// Reference [`IndexService`] over SQLite. Owns the connection for the run;
/// no other component issues commits.
pub struct SqliteIndex {
    conn: Connection,
    pending: Vec<(CanonicalKey, BTreeMap<String, String>)>,
}

impl SqliteIndex {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            pending: Vec::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

impl IndexService for SqliteIndex {
    fn add(&mut self, key: &CanonicalKey, fields: &BTreeMap<String, String>) -> Result<()> {
        self.pending.push((key.clone(), fields.clone()));
        Ok(())
    }

    /// Write all buffered adds in one transaction. On error nothing from
    /// this batch is durable.
    fn commit(&mut self) -> Result<()> {
        let tx = self.conn.transaction().context("begin transaction")?;
        {
            let mut stmt = tx.prepare(INSERT_DOCUMENT_SQL).context("prepare insert")?;
            for (key, fields) in &self.pending {
                stmt.execute((
                    hex::encode(key.content_hash),
                    key.path.to_string_lossy(),
                    fields.get("custodian").map(String::as_str),
                    fields.get("doctype").map(String::as_str),
                    serde_json::to_string(fields).context("serialize fields")?,
                ))
                .context("insert document")?;
            }
        }
        tx.commit().context("commit transaction")?;
        self.pending.clear();
        Ok(())
    }
}

/// Number of committed documents.
pub fn document_count(conn: &Connection) -> Result<u64> {
    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as u64)
    .context("count documents")
}

/// Full committed-facet scan: (key, custodian, doctype) per document. The
/// metadata cache rebuilds from this.
pub fn facet_rows(conn: &Connection) -> Result<Vec<(CanonicalKey, Option<String>, Option<String>)>> {
    let mut stmt = conn
        .prepare("SELECT content_hash, path, custodian, doctype FROM documents")
        .context("prepare facet scan")?;
    let rows = stmt.query_map([], |row| {
        let hash_hex: String = row.get(0)?;
        let path: String = row.get(1)?;
        let custodian: Option<String> = row.get(2)?;
        let doctype: Option<String> = row.get(3)?;
        Ok((hash_hex, path, custodian, doctype))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (hash_hex, path, custodian, doctype) = row?;
        let bytes = hex::decode(&hash_hex).context("decode stored content_hash")?;
        let content_hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("stored content_hash is not 32 bytes"))?;
        out.push((
            CanonicalKey {
                content_hash,
                path: PathBuf::from(path),
            },
            custodian,
            doctype,
        ));
    }
    Ok(out)
}

/// All committed keys in canonical order. Hex is monotone in the underlying
/// bytes, so ordering by the hex column is ordering by hash.
pub fn committed_keys(conn: &Connection) -> Result<Vec<CanonicalKey>> {
    let mut stmt = conn
        .prepare("SELECT content_hash, path FROM documents ORDER BY content_hash, path")
        .context("prepare key scan")?;
    let rows = stmt.query_map([], |row| {
        let hash_hex: String = row.get(0)?;
        let path: String = row.get(1)?;
        Ok((hash_hex, path))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (hash_hex, path) = row?;
        let bytes = hex::decode(&hash_hex).context("decode stored content_hash")?;
        let content_hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("stored content_hash is not 32 bytes"))?;
        out.push(CanonicalKey {
            content_hash,
            path: PathBuf::from(path),
        });
    }
    Ok(out)
}
