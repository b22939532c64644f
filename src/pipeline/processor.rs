//! Processing port: the seam where extraction collaborators plug in.
//!
//! OCR, PII detection, privilege classification and friends live behind this
//! trait; the pipeline only requires that `process` is side-effect-isolated
//! so results depend on the document alone, not on sibling scheduling.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::engine::tools::path_relative_to;
use crate::types::DocumentDescriptor;

/// Extraction contract run inside the worker pool. Errors are isolated to
/// the document: the orchestrator turns them into `Failed` results without
/// touching sibling workers.
pub trait DocumentProcessor: Send + Sync {
    fn process(&self, descriptor: &DocumentDescriptor) -> Result<BTreeMap<String, String>>;
}

/// Reference processor: derives facet fields from the path itself.
///
/// `custodian` is the first path component under the root (discovery corpora
/// are conventionally laid out one top-level directory per custodian),
/// `doctype` the lowercased extension. Real extraction replaces this via the
/// trait; these fields are enough to drive the facet cache end to end.
pub struct FieldExtractor {
    root: PathBuf,
}

impl FieldExtractor {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl DocumentProcessor for FieldExtractor {
    fn process(&self, descriptor: &DocumentDescriptor) -> Result<BTreeMap<String, String>> {
        let rel = path_relative_to(&descriptor.path, &self.root)
            .unwrap_or_else(|| descriptor.path.clone());
        let custodian = rel
            .components()
            .next()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        let doctype = descriptor
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "none".to_string());

        let mut fields = BTreeMap::new();
        fields.insert("custodian".to_string(), custodian);
        fields.insert("doctype".to_string(), doctype);
        fields.insert("size".to_string(), descriptor.size.to_string());
        Ok(fields)
    }
}
