//! Deterministic ordering: the canonical `(content_hash, path)` total order.
//!
//! Every component that must produce a reproducible sequence sorts with this
//! module and nothing else. Modification time, inode, discovery order, and
//! worker completion order are all illegal sort inputs.

use anyhow::{Result, bail};
use rayon::prelude::*;
use std::cmp::Ordering;

use crate::types::{CanonicalKey, DocumentDescriptor};

/// Derive the canonical key for a descriptor. Fails only on malformed input
/// (empty path).
pub fn order_key(d: &DocumentDescriptor) -> Result<CanonicalKey> {
    if d.path.as_os_str().is_empty() {
        bail!("descriptor has empty path");
    }
    Ok(CanonicalKey {
        content_hash: d.content_hash,
        path: d.path.clone(),
    })
}

/// Pure tuple compare of `(content_hash, path)`. For equal content the
/// lexicographically smaller path sorts first; ties are impossible because
/// the tuple is unique per file.
pub fn compare(a: &CanonicalKey, b: &CanonicalKey) -> Ordering {
    a.content_hash
        .cmp(&b.content_hash)
        .then_with(|| a.path.cmp(&b.path))
}

/// Sort descriptors into canonical order in place. Unstable parallel sort is
/// fine: the key is total and unique, so the result is deterministic.
pub fn sort_canonical(descriptors: &mut [DocumentDescriptor]) {
    descriptors.par_sort_unstable_by(|a, b| {
        a.content_hash
            .cmp(&b.content_hash)
            .then_with(|| a.path.cmp(&b.path))
    });
}
