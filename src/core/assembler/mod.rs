//! Bundle assembler - the chunking engine
//!
//! The assembler accumulates resource entries into the current batch,
//! re-seeds the mandatory header set into every new chunk, reports when a
//! chunk is full, and seals chunks for dispatch. One `begin_admission` ..
//! `end_admission` cycle corresponds to one source admission and owns the
//! chunk-scoped identity cache and the chunk counter.
//!
//! The reset-and-reseed pattern is an explicit finite-state machine:
//!
//! ```text
//! Empty -> Accumulating -> Full -> Flushed
//!             ^________________________|
//! ```
//!
//! Every chunk is submitted as an independent atomic unit, so after a flush
//! the fresh chunk has no latent knowledge of previously submitted header
//! entries; the header set is seeded again and chunk-scoped entities are
//! re-registered on demand through [`BundleAssembler::resolve_or_register`].

pub mod batch;
pub mod cache;

pub use batch::Batch;
pub use cache::{CacheKind, ChunkCache, Directory};

use crate::domain::entry::ResourceEntry;
use crate::domain::{MeridianError, Result};

/// Assembler state within one admission cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// No admission in progress
    Empty,
    /// Entries are being appended to the current chunk
    Accumulating,
    /// The current chunk exceeded the threshold and must be flushed
    Full,
    /// A chunk was just sealed; reseeding returns to Accumulating
    Flushed,
}

/// The header entries seeded into every chunk of an admission, plus the
/// ward-location keys they registered so the chunk cache can be primed on
/// each reseed
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    pub entries: Vec<ResourceEntry>,
    /// (natural key, handle) pairs for ward locations inside the header
    pub locations: Vec<(String, String)>,
}

/// A chunk sealed for dispatch, with its index within the admission
#[derive(Debug)]
pub struct SealedChunk {
    pub chunk_index: u32,
    pub batch: Batch,
}

/// Accumulates entries into size-bounded chunks for one admission at a time
pub struct BundleAssembler {
    threshold: usize,
    state: AssemblerState,
    batch: Batch,
    cache: ChunkCache,
    header: HeaderSet,
    chunk_index: u32,
}

impl BundleAssembler {
    /// Creates an assembler flushing after `threshold` entries
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            state: AssemblerState::Empty,
            batch: Batch::new(),
            cache: ChunkCache::new(),
            header: HeaderSet::default(),
            chunk_index: 1,
        }
    }

    /// Current state of the chunking state machine
    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Chunk index of the batch currently being accumulated (1-based,
    /// reset at `begin_admission`)
    pub fn chunk_index(&self) -> u32 {
        self.chunk_index
    }

    /// Entry count of the current batch
    pub fn entry_count(&self) -> usize {
        self.batch.len()
    }

    /// Sequence label for the chunk currently being accumulated:
    /// `<patientIndex>_<admissionIndex>_<chunkIndex>`
    pub fn sequence_label(&self, patient_index: u32, admission_index: u32) -> String {
        format!("{patient_index}_{admission_index}_{}", self.chunk_index)
    }

    /// Starts a new admission cycle: chunk counter back to 1, chunk cache
    /// cleared, fresh batch seeded with the header set
    pub fn begin_admission(&mut self, header: HeaderSet) {
        self.chunk_index = 1;
        self.header = header;
        self.batch = Batch::new();
        self.cache.reset();
        self.seed_header();
        self.state = AssemblerState::Accumulating;
    }

    /// Appends one entry to the current batch. Transitions to `Full` once
    /// the entry count exceeds the threshold; the caller must flush before
    /// starting the next entry family so anything added afterwards lands in
    /// a batch that already contains everything it may reference.
    pub fn add_entry(&mut self, entry: ResourceEntry) {
        debug_assert!(
            matches!(
                self.state,
                AssemblerState::Accumulating | AssemblerState::Full
            ),
            "add_entry outside an admission cycle"
        );
        self.batch.push(entry);
        if self.batch.len() > self.threshold {
            self.state = AssemblerState::Full;
        }
    }

    /// True when the current chunk exceeded the threshold
    pub fn is_full(&self) -> bool {
        self.state == AssemblerState::Full
    }

    /// Handle for a chunk-scoped entity already registered in the current
    /// chunk
    pub fn lookup(&self, kind: CacheKind, key: &str) -> Option<String> {
        self.cache.get(kind, key).map(str::to_string)
    }

    /// Registers a chunk-scoped entity: appends its conditional-create
    /// entry to the current batch, caches the key → handle mapping and
    /// returns the handle
    pub fn register(&mut self, kind: CacheKind, key: &str, entry: ResourceEntry) -> Result<String> {
        let handle = entry
            .handle()
            .ok_or_else(|| {
                MeridianError::CacheMiss(format!(
                    "registered entity {key} carries no referenceable handle"
                ))
            })?
            .to_string();
        self.add_entry(entry);
        self.cache.insert(kind, key.to_string(), handle.clone());
        Ok(handle)
    }

    /// Resolves a chunk-scoped entity to its in-chunk handle, registering
    /// it first when the current chunk does not contain it yet.
    ///
    /// On a cache miss the factory materializes the conditional-create
    /// entry (carrying the handle); the entry is appended to the current
    /// batch before the handle is returned, so a referencing entry added
    /// next is guaranteed to land after its referent.
    pub fn resolve_or_register<F>(
        &mut self,
        kind: CacheKind,
        key: &str,
        factory: F,
    ) -> Result<String>
    where
        F: FnOnce() -> ResourceEntry,
    {
        if let Some(handle) = self.lookup(kind, key) {
            return Ok(handle);
        }
        self.register(kind, key, factory())
    }

    /// Seals the full chunk and prepares the next one: chunk cache cleared,
    /// fresh batch, header re-seeded, chunk counter incremented. Everything
    /// the next entry may reference is present again before accumulation
    /// continues.
    pub fn flush(&mut self) -> SealedChunk {
        let sealed = SealedChunk {
            chunk_index: self.chunk_index,
            batch: std::mem::take(&mut self.batch),
        };
        self.state = AssemblerState::Flushed;
        self.chunk_index += 1;
        self.cache.reset();
        self.seed_header();
        self.state = AssemblerState::Accumulating;

        tracing::debug!(
            chunk_index = sealed.chunk_index,
            entries = sealed.batch.len(),
            "Sealed full chunk, reseeded header"
        );
        sealed
    }

    /// Ends the admission cycle, sealing the final (possibly non-full)
    /// chunk regardless of fullness
    pub fn end_admission(&mut self) -> SealedChunk {
        let sealed = SealedChunk {
            chunk_index: self.chunk_index,
            batch: std::mem::take(&mut self.batch),
        };
        self.cache.reset();
        self.header = HeaderSet::default();
        self.state = AssemblerState::Empty;
        sealed
    }

    /// Seeds the header entries into the current batch and primes the
    /// chunk cache with the header's ward-location handles
    fn seed_header(&mut self) {
        for entry in self.header.entries.clone() {
            self.batch.push(entry);
        }
        for (key, handle) in self.header.locations.clone() {
            self.cache.insert(CacheKind::Location, key, handle);
        }
    }
}
