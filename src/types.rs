//! Public and internal types for the veridex API and pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// 256-bit blake3 digest of a file's bytes.
pub type ContentHash = [u8; 32];

/// Metadata for a single discovered document. Immutable once created.
///
/// `path` is absolute and has already been validated against the root
/// boundary; `content_hash` is computed by streaming the file while walking.
#[derive(Clone, Debug)]
pub struct DocumentDescriptor {
    pub path: PathBuf,
    pub content_hash: ContentHash,
    /// File size in bytes.
    pub size: u64,
    /// Discovery time in milliseconds since epoch. Informational only; never
    /// participates in ordering.
    pub discovered_at: i64,
}

/// The only legal sort key anywhere in the pipeline: `(content_hash, path)`.
///
/// The derived `Ord` is the tuple order, so output sequence depends on file
/// content and path alone, never on traversal order, mtime, inode, or worker
/// completion timing. Unique per file: equal-content files are disambiguated
/// by path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey {
    pub content_hash: ContentHash,
    pub path: PathBuf,
}

impl CanonicalKey {
    /// Short display form: first 12 hex chars of the hash plus the path.
    pub fn display(&self) -> String {
        format!("{}:{}", &hex::encode(self.content_hash)[..12], self.path.display())
    }
}

/// Outcome of processing one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultStatus {
    Ok,
    Failed(String),
}

/// Per-document result produced by a worker, consumed by the index builder
/// strictly in canonical order.
#[derive(Clone, Debug)]
pub struct ProcessingResult {
    pub key: CanonicalKey,
    /// Extracted metadata fields. BTreeMap so serialization order is stable.
    pub extracted_fields: BTreeMap<String, String>,
    pub status: ResultStatus,
}

impl ProcessingResult {
    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }
}

/// Options for [`run_pipeline`](crate::run_pipeline).
#[derive(Clone, Debug)]
pub struct Opts {
    /// Worker pool size. When None, available parallelism minus one (min 1).
    pub num_workers: Option<usize>,
    /// Documents per index commit batch.
    pub batch_size: usize,
    /// Follow symbolic links during discovery. Targets are re-validated
    /// against the root boundary after resolution.
    pub follow_links: bool,
    /// Exclude patterns (glob syntax, e.g. `*.tmp`).
    pub exclude: Vec<String>,
    /// Strict mode: fail the run on the first walk error instead of skipping.
    pub strict: bool,
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            num_workers: None,
            batch_size: crate::utils::config::DEFAULT_BATCH_COMMIT_SIZE,
            follow_links: false,
            exclude: Vec::new(),
            strict: false,
            verbose: false,
        }
    }
}

/// Summary returned by [`run_pipeline`](crate::run_pipeline).
#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub documents_processed: usize,
    pub documents_failed: usize,
    /// Highest ledger sequence number after the run.
    pub final_ledger_seq: u64,
    /// True when the run was cut short by the cancel token; the report covers
    /// the prefix of results released before cancellation.
    pub cancelled: bool,
}
