//! Transaction batch
//!
//! A [`Batch`] is an ordered sequence of resource entries submitted as one
//! atomic transaction bundle. Entry order respects reference dependency:
//! the pipeline appends referenced entries before the entries that
//! reference them, and the batch preserves insertion order.

use crate::domain::entry::ResourceEntry;
use crate::domain::Result;
use serde_json::{json, Value};

/// Ordered sequence of resource entries forming one transaction bundle
#[derive(Debug, Clone, Default)]
pub struct Batch {
    entries: Vec<ResourceEntry>,
}

impl Batch {
    /// Creates an empty batch
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries currently in the batch
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the batch holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry, preserving insertion order
    pub fn push(&mut self, entry: ResourceEntry) {
        self.entries.push(entry);
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[ResourceEntry] {
        &self.entries
    }

    /// Renders the batch as a FHIR transaction bundle
    pub fn to_bundle(&self) -> Value {
        json!({
            "resourceType": "Bundle",
            "type": "transaction",
            "entry": self.entries.iter().map(|e| e.to_bundle_entry()).collect::<Vec<_>>(),
        })
    }

    /// Serializes the transaction bundle for dispatch
    pub fn serialize(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_bundle())?)
    }
}
