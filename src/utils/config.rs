//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived default filenames: built once from `CARGO_PKG_NAME`.
pub struct PackagePaths {
    pkg_name: &'static str,
    index_filename: String,
    ledger_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache paths from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                index_filename: format!(".{pkg}.db"),
                ledger_filename: format!(".{pkg}.audit"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Default index database filename inside the root.
    pub fn index_filename(&self) -> &str {
        &self.index_filename
    }

    /// Default audit ledger filename inside the root. The ledger key file is
    /// this name plus `.key`.
    pub fn ledger_filename(&self) -> &str {
        &self.ledger_filename
    }

    /// Filenames excluded from discovery by default: the index, the ledger,
    /// its key, and SQLite WAL/SHM siblings must never enter the corpus.
    pub fn default_exclude_patterns(&self) -> Vec<String> {
        vec![
            self.index_filename.clone(),
            format!("{}*", self.index_filename),
            format!("{}*", self.ledger_filename),
        ]
    }
}

// ---- Hashing ----

/// Hashing I/O thresholds and buffer sizes.
pub struct HashingConsts;

impl HashingConsts {
    /// File size above which hashing uses memory-mapped I/O (bytes). 100 MB.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// Chunk size for reading files below mmap threshold (bytes). 1 MB.
    pub const HASH_READ_CHUNK_SIZE: usize = 1024 * 1024;
}

// ---- Pipeline ----

/// Documents per index commit batch (balance memory vs checkpoint density).
pub const DEFAULT_BATCH_COMMIT_SIZE: usize = 1000;

/// In-flight cap = worker count times this. Bounds reorder-buffer memory
/// while leaving enough slack that a slow head doesn't starve the pool.
pub const IN_FLIGHT_MULTIPLIER: usize = 4;
