//! Builder-boundary records
//!
//! These structs are what the source adapter (the thin read-only query
//! layer) hands to the pipeline: one ordered record graph per patient, plus
//! the per-run ward and caregiver directories. They carry raw source values;
//! rendering into FHIR payloads happens in [`crate::core::transform`].

use chrono::{DateTime, Utc};

/// One patient with all of their admissions
#[derive(Debug, Clone)]
pub struct PatientRecord {
    pub subject_id: String,
    pub gender: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
    pub death_date: Option<DateTime<Utc>>,
    pub admissions: Vec<AdmissionRecord>,
}

/// One hospitalization episode; the unit of chunking scope
#[derive(Debug, Clone)]
pub struct AdmissionRecord {
    pub admission_id: String,
    pub admission_type: Option<String>,
    pub admit_time: Option<DateTime<Utc>>,
    pub discharge_time: Option<DateTime<Utc>>,
    pub diagnoses: Vec<DiagnosisRecord>,
    pub procedures: Vec<ProcedureRecord>,
    pub transfers: Vec<TransferRecord>,
    pub prescriptions: Vec<PrescriptionRecord>,
    pub chart_events: Vec<ChartEventRecord>,
    pub lab_events: Vec<LabEventRecord>,
}

/// Coded diagnosis attached to an admission
#[derive(Debug, Clone)]
pub struct DiagnosisRecord {
    pub icd_code: String,
    pub description: Option<String>,
    pub seq_number: i32,
}

/// Coded procedure attached to an admission
#[derive(Debug, Clone)]
pub struct ProcedureRecord {
    pub icd_code: String,
    pub description: Option<String>,
    pub seq_number: i32,
}

/// One step of the ward transfer chain within an admission
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub ward_id: i32,
    pub in_time: Option<DateTime<Utc>>,
    pub out_time: Option<DateTime<Utc>>,
}

/// A prescription row; yields a medication definition plus an
/// administration event
#[derive(Debug, Clone)]
pub struct PrescriptionRecord {
    pub drug_name: String,
    /// National drug code; the medication's natural key when present
    pub ndc: Option<String>,
    /// Generic sequence number, fallback key when no NDC is recorded
    pub gsn: Option<String>,
    pub dose_value: Option<String>,
    pub dose_unit: Option<String>,
    pub route: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl PrescriptionRecord {
    /// Natural key used to deduplicate the medication definition.
    /// Prefers the NDC, falls back to the GSN, then the drug name.
    pub fn drug_code(&self) -> &str {
        self.ndc
            .as_deref()
            .filter(|c| !c.is_empty() && *c != "0")
            .or(self.gsn.as_deref().filter(|c| !c.is_empty()))
            .unwrap_or(&self.drug_name)
    }
}

/// Bedside (chart) measurement
#[derive(Debug, Clone)]
pub struct ChartEventRecord {
    pub measurement: String,
    pub value: Option<String>,
    pub numeric_value: Option<f64>,
    pub unit: Option<String>,
    /// Caregiver who recorded the event; 0 / None means unknown
    pub caregiver_id: Option<i32>,
    pub record_time: Option<DateTime<Utc>>,
}

/// Laboratory measurement
#[derive(Debug, Clone)]
pub struct LabEventRecord {
    pub measurement: String,
    pub loinc_code: Option<String>,
    pub fluid: Option<String>,
    pub value: Option<String>,
    pub numeric_value: Option<f64>,
    pub unit: Option<String>,
    pub abnormal: bool,
    pub record_time: Option<DateTime<Utc>>,
}

/// Ward directory entry, preloaded once per run
#[derive(Debug, Clone)]
pub struct WardRecord {
    pub ward_id: i32,
    pub care_unit: Option<String>,
}

/// Caregiver directory entry, preloaded once per run
#[derive(Debug, Clone)]
pub struct CaregiverRecord {
    pub caregiver_id: i32,
    /// Job title abbreviation (RN, MD, ...)
    pub title: Option<String>,
    pub description: Option<String>,
}
