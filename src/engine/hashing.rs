//! File hashing utilities

use anyhow::Result;
use blake3::Hasher;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use crate::types::ContentHash;
use crate::utils::config::HashingConsts;

/// Hash a file with blake3, streaming: memory-mapped I/O above the threshold,
/// chunked reads below it. Never loads the whole file onto the heap.
pub fn hash_file(path: &Path, size: u64) -> Result<ContentHash> {
    let file = File::open(path)?;
    let mut hasher = Hasher::new();

    if size > HashingConsts::HASH_MMAP_THRESHOLD {
        // Memory-mapped I/O for large files (blake3 already uses SIMD internally)
        let mmap = unsafe { Mmap::map(&file)? };
        hasher.update(&mmap);
    } else {
        use std::io::Read;
        let mut reader =
            std::io::BufReader::with_capacity(HashingConsts::HASH_READ_CHUNK_SIZE, file);
        let mut buffer = vec![0u8; HashingConsts::HASH_READ_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }

    Ok(*hasher.finalize().as_bytes())
}
