//! Metadata cache: O(1) custodian/doctype facet lookups over committed state.
//!
//! Derived entirely from the index; staleness is detected against the
//! ledger's tail sequence and never silently tolerated — a stale lookup
//! refreshes synchronously before answering.

use anyhow::Result;
use log::debug;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap};

use crate::engine::db_ops::facet_rows;
use crate::types::CanonicalKey;

/// Facet dimensions the cache indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facet {
    Custodian,
    Doctype,
}

/// Facet value → set of canonical keys, rebuilt from a full index scan and
/// incrementally extended as committed batches land.
pub struct MetadataCache {
    custodian: HashMap<String, BTreeSet<CanonicalKey>>,
    doctype: HashMap<String, BTreeSet<CanonicalKey>>,
    /// Bumped on every rebuild.
    generation: u64,
    /// Ledger tail the current contents reflect. None = never built.
    recorded_tail: Option<Option<u64>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self {
            custodian: HashMap::new(),
            doctype: HashMap::new(),
            generation: 0,
            recorded_tail: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when the ledger has advanced past what the cache reflects (or
    /// the cache was never built).
    pub fn is_stale(&self, ledger_tail: Option<u64>) -> bool {
        self.recorded_tail != Some(ledger_tail)
    }

    /// Rebuild from a full scan of committed index state and record the
    /// ledger tail it reflects.
    pub fn refresh(&mut self, conn: &Connection, ledger_tail: Option<u64>) -> Result<()> {
        self.custodian.clear();
        self.doctype.clear();
        for (key, custodian, doctype) in facet_rows(conn)? {
            if let Some(c) = custodian {
                self.custodian.entry(c).or_default().insert(key.clone());
            }
            if let Some(d) = doctype {
                self.doctype.entry(d).or_default().insert(key);
            }
        }
        self.generation += 1;
        self.recorded_tail = Some(ledger_tail);
        debug!(
            "cache refreshed: generation {}, tail {:?}",
            self.generation, ledger_tail
        );
        Ok(())
    }

    /// Record one committed document without a full rebuild. The index
    /// builder calls this for every document of a committed batch, then
    /// advances the recorded tail via [`note_tail`](Self::note_tail).
    pub fn insert(&mut self, key: &CanonicalKey, custodian: Option<&str>, doctype: Option<&str>) {
        if let Some(c) = custodian {
            self.custodian
                .entry(c.to_string())
                .or_default()
                .insert(key.clone());
        }
        if let Some(d) = doctype {
            self.doctype
                .entry(d.to_string())
                .or_default()
                .insert(key.clone());
        }
    }

    /// Advance the recorded ledger tail after incremental inserts.
    pub fn note_tail(&mut self, ledger_tail: Option<u64>) {
        self.recorded_tail = Some(ledger_tail);
    }

    /// Facet lookup. Refreshes first when the ledger tail has moved past the
    /// cache's recorded tail, so answers never reflect uncommitted state.
    pub fn lookup(
        &mut self,
        conn: &Connection,
        ledger_tail: Option<u64>,
        facet: Facet,
        value: &str,
    ) -> Result<BTreeSet<CanonicalKey>> {
        if self.is_stale(ledger_tail) {
            self.refresh(conn, ledger_tail)?;
        }
        let map = match facet {
            Facet::Custodian => &self.custodian,
            Facet::Doctype => &self.doctype,
        };
        Ok(map.get(value).cloned().unwrap_or_default())
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
