//! In-memory record source
//!
//! Serves a fixed set of patient graphs and directories from memory.
//! Used by the integration tests and useful for dry runs against
//! hand-built fixtures.

use crate::adapters::source::RecordSource;
use crate::domain::records::{CaregiverRecord, PatientRecord, WardRecord};
use crate::domain::{MeridianError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Record source backed by pre-built records
#[derive(Debug, Default)]
pub struct InMemorySource {
    patients: Vec<PatientRecord>,
    wards: HashMap<i32, WardRecord>,
    caregivers: HashMap<i32, CaregiverRecord>,
}

impl InMemorySource {
    /// Creates a source over the given patients and directories
    pub fn new(
        patients: Vec<PatientRecord>,
        wards: HashMap<i32, WardRecord>,
        caregivers: HashMap<i32, CaregiverRecord>,
    ) -> Self {
        Self {
            patients,
            wards,
            caregivers,
        }
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn patient_count(&self) -> Result<u32> {
        Ok(self.patients.len() as u32)
    }

    async fn patient_by_index(&self, index: u32) -> Result<PatientRecord> {
        if index == 0 {
            return Err(MeridianError::BuilderData(
                "patient index is 1-based".to_string(),
            ));
        }
        self.patients
            .get((index - 1) as usize)
            .cloned()
            .ok_or_else(|| MeridianError::BuilderData(format!("no patient at index {index}")))
    }

    async fn wards(&self) -> Result<HashMap<i32, WardRecord>> {
        Ok(self.wards.clone())
    }

    async fn caregivers(&self) -> Result<HashMap<i32, CaregiverRecord>> {
        Ok(self.caregivers.clone())
    }
}
