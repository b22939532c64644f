//! Streaming discoverer: lazily enumerates documents under a root boundary.
//!
//! The walk yields each descriptor as it is produced, so buffering stays O(1)
//! relative to corpus size. A fresh call re-walks from the root; repeated
//! calls over an unchanged tree produce the same multiset of descriptors.
//! Every yielded path is resolved and re-checked against the boundary, so a
//! symlink or `..` segment pointing outside the root surfaces as a
//! [`DiscoverOutcome::Escape`] instead of a descriptor.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::engine::hashing::hash_file;
use crate::engine::tools::{glob_match, now_ms};
use crate::types::DocumentDescriptor;

/// Configured discovery root: canonicalized absolute path plus the
/// follow-symlinks flag. All discoverer output resolves inside `root`.
#[derive(Clone, Debug)]
pub struct RootBoundary {
    root: PathBuf,
    follow_links: bool,
}

impl RootBoundary {
    /// Canonicalize `root` and build the boundary. Fails if the root does not
    /// exist or is not a directory.
    pub fn new(root: &Path, follow_links: bool) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("canonicalize root {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("root is not a directory: {}", root.display());
        }
        Ok(Self { root, follow_links })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn follow_links(&self) -> bool {
        self.follow_links
    }

    /// Resolve `path` and check it stays inside the boundary. Returns the
    /// resolved absolute path, or `None` when it escapes.
    pub fn resolve(&self, path: &Path) -> Result<Option<PathBuf>> {
        let resolved = path
            .canonicalize()
            .with_context(|| format!("resolve {}", path.display()))?;
        if resolved.starts_with(&self.root) {
            Ok(Some(resolved))
        } else {
            Ok(None)
        }
    }
}

/// One result from discovery: a descriptor, a boundary violation, or a walk
/// error with optional path.
pub enum DiscoverOutcome {
    Doc(DocumentDescriptor),
    /// Entry resolved outside the root boundary. Fatal to this entry only;
    /// siblings continue.
    Escape { path: PathBuf, resolved: PathBuf },
    Err { msg: String, path: Option<PathBuf> },
}

/// Lazily walk `boundary` and yield a [`DiscoverOutcome`] per regular file.
///
/// Symlinks are followed only when the boundary says so; either way the
/// resolved path is re-validated against the boundary. Hashing happens inline
/// while walking, streaming each file once.
pub fn discover<'a>(
    boundary: &'a RootBoundary,
    exclude: &'a [String],
) -> impl Iterator<Item = DiscoverOutcome> + 'a {
    walkdir::WalkDir::new(boundary.root())
        .follow_links(boundary.follow_links())
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |r| to_outcome(boundary, exclude, r))
}

fn to_outcome(
    boundary: &RootBoundary,
    exclude: &[String],
    r: walkdir::Result<walkdir::DirEntry>,
) -> Option<DiscoverOutcome> {
    let entry = match r {
        Ok(entry) => entry,
        Err(err) => {
            // A symlink loop or an unreadable dir shows up here, not as an entry.
            return Some(DiscoverOutcome::Err {
                msg: format!("{}", err),
                path: err.path().map(PathBuf::from),
            });
        }
    };
    let file_type = entry.file_type();
    let path = entry.into_path();
    if is_excluded(&path, exclude) {
        return None;
    }
    // With follow_links off, file_type is the link itself. The link still
    // gets a boundary check: a target outside the root is recorded as an
    // escape even though the link is never followed into a descriptor.
    if file_type.is_symlink() && !boundary.follow_links() {
        return match path.canonicalize() {
            Ok(resolved) if !resolved.starts_with(boundary.root()) => {
                Some(DiscoverOutcome::Escape { path, resolved })
            }
            // In-root target (not followed) or broken link: not a document.
            _ => None,
        };
    }
    // Dirs are traversal structure, not documents.
    if !file_type.is_file() {
        return None;
    }
    let resolved = match boundary.resolve(&path) {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            // Followed symlink whose target lives outside the root.
            let resolved = path.canonicalize().unwrap_or_else(|_| path.clone());
            return Some(DiscoverOutcome::Escape { path, resolved });
        }
        Err(err) => {
            return Some(DiscoverOutcome::Err {
                msg: format!("{:#}", err),
                path: Some(path),
            });
        }
    };
    Some(describe(resolved))
}

/// Stat and hash one resolved path into a descriptor.
fn describe(path: PathBuf) -> DiscoverOutcome {
    let size = match std::fs::metadata(&path) {
        Ok(meta) => meta.len(),
        Err(err) => {
            return DiscoverOutcome::Err {
                msg: format!("stat: {}", err),
                path: Some(path),
            };
        }
    };
    match hash_file(&path, size) {
        Ok(content_hash) => DiscoverOutcome::Doc(DocumentDescriptor {
            path,
            content_hash,
            size,
            discovered_at: now_ms(),
        }),
        Err(err) => DiscoverOutcome::Err {
            msg: format!("hash: {:#}", err),
            path: Some(path),
        },
    }
}

fn is_excluded(path: &Path, exclude: &[String]) -> bool {
    if exclude.is_empty() {
        return false;
    }
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    let path_str = path.to_str().unwrap_or("");
    exclude
        .iter()
        .any(|p| glob_match(p, name) || glob_match(p, path_str))
}
