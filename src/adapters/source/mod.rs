//! Source adapters - the thin read-only query layer
//!
//! A [`RecordSource`] supplies, per patient, an ordered in-memory record
//! graph (admissions with their diagnoses, procedures, transfers,
//! prescriptions and events) plus the per-run ward and caregiver
//! directory preloads. No translation logic lives here.

pub mod memory;
pub mod postgres;

pub use memory::InMemorySource;
pub use postgres::PostgresSource;

use crate::domain::records::{CaregiverRecord, PatientRecord, WardRecord};
use crate::domain::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Read-only access to the source clinical store
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Total number of patients in the source
    async fn patient_count(&self) -> Result<u32>;

    /// Fetches the patient at the given 1-based row position, with all of
    /// their admissions fully joined
    ///
    /// # Errors
    ///
    /// Returns a `BuilderData` error when the row is missing or malformed;
    /// the pipeline skips the patient and continues.
    async fn patient_by_index(&self, index: u32) -> Result<PatientRecord>;

    /// Preloads the ward directory (once per run)
    async fn wards(&self) -> Result<HashMap<i32, WardRecord>>;

    /// Preloads the caregiver directory (once per run)
    async fn caregivers(&self) -> Result<HashMap<i32, CaregiverRecord>>;
}
