//! Identity cache tiers
//!
//! Two tiers back reference resolution during assembly:
//!
//! - [`Directory`] is the process-wide tier: ward and caregiver lookups
//!   preloaded once from the source before the run starts and read-only
//!   afterward, so it needs no synchronization.
//! - [`ChunkCache`] is the chunk-scoped tier: natural key → transient
//!   handle for entities already registered in the *current* chunk. It is
//!   cleared on every flush; the same logical entity is intentionally
//!   re-registered as a fresh conditional create in later chunks, and the
//!   destination's conditional-create guard deduplicates across chunks.

use crate::domain::records::{CaregiverRecord, WardRecord};
use std::collections::HashMap;

/// Process-wide, read-only-after-load directory of shared entities
#[derive(Debug, Clone, Default)]
pub struct Directory {
    wards: HashMap<i32, WardRecord>,
    caregivers: HashMap<i32, CaregiverRecord>,
}

impl Directory {
    /// Builds the directory from the per-run preloads
    pub fn new(
        wards: HashMap<i32, WardRecord>,
        caregivers: HashMap<i32, CaregiverRecord>,
    ) -> Self {
        Self { wards, caregivers }
    }

    /// Looks up a ward by source id
    pub fn ward(&self, ward_id: i32) -> Option<&WardRecord> {
        self.wards.get(&ward_id)
    }

    /// Looks up a caregiver by source id
    pub fn caregiver(&self, caregiver_id: i32) -> Option<&CaregiverRecord> {
        self.caregivers.get(&caregiver_id)
    }

    pub fn ward_count(&self) -> usize {
        self.wards.len()
    }

    pub fn caregiver_count(&self) -> usize {
        self.caregivers.len()
    }
}

/// Which chunk-scoped map a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Location,
    Practitioner,
    Medication,
}

/// Chunk-scoped key → handle mappings, cleared on every flush
#[derive(Debug, Default)]
pub struct ChunkCache {
    locations: HashMap<String, String>,
    practitioners: HashMap<String, String>,
    medications: HashMap<String, String>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, kind: CacheKind) -> &HashMap<String, String> {
        match kind {
            CacheKind::Location => &self.locations,
            CacheKind::Practitioner => &self.practitioners,
            CacheKind::Medication => &self.medications,
        }
    }

    fn map_mut(&mut self, kind: CacheKind) -> &mut HashMap<String, String> {
        match kind {
            CacheKind::Location => &mut self.locations,
            CacheKind::Practitioner => &mut self.practitioners,
            CacheKind::Medication => &mut self.medications,
        }
    }

    /// Handle for a key already registered in the current chunk
    pub fn get(&self, kind: CacheKind, key: &str) -> Option<&str> {
        self.map(kind).get(key).map(String::as_str)
    }

    /// Records a key → handle mapping for the current chunk
    pub fn insert(&mut self, kind: CacheKind, key: String, handle: String) {
        self.map_mut(kind).insert(key, handle);
    }

    /// Invalidates every chunk-scoped mapping; called on flush
    pub fn reset(&mut self) {
        self.locations.clear();
        self.practitioners.clear();
        self.medications.clear();
    }
}
