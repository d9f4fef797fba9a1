//! Export pipeline - the producer loop
//!
//! Walks the source patient by patient, renders each admission into an
//! encounter-scoped resource graph, drives the bundle assembler through its
//! chunking cycle and enqueues every sealed chunk for dispatch. Record-level
//! data problems are skipped with a warning; the run only aborts on source,
//! queue or serialization faults. The terminal marker is enqueued on every
//! exit path so the consumer always halts.

use crate::adapters::source::RecordSource;
use crate::core::assembler::{BundleAssembler, CacheKind, Directory, HeaderSet, SealedChunk};
use crate::core::transform::{self, DiagnosisReference, LocationReference};
use crate::dispatch::{DispatchMessage, DispatchSender};
use crate::domain::entry::{new_handle, ResourceEntry, ResourceType};
use crate::domain::records::{AdmissionRecord, PatientRecord};
use crate::domain::{MeridianError, Result};
use std::sync::Arc;

/// Counters reported at the end of a pipeline run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub patients: u32,
    pub patients_skipped: u32,
    pub admissions: u32,
    pub chunks: u32,
    pub entities_skipped: u32,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!(
            patients = self.patients,
            patients_skipped = self.patients_skipped,
            admissions = self.admissions,
            chunks = self.chunks,
            entities_skipped = self.entities_skipped,
            "Export run finished"
        );
    }
}

/// Transient handle paired with the entry's conditional guard, for
/// entities rendered once and re-used across an admission's chunks
struct RenderedHeader {
    entry: ResourceEntry,
    handle: String,
}

fn rendered(resource_type: ResourceType, resource: serde_json::Value, guard: String) -> RenderedHeader {
    let handle = new_handle();
    RenderedHeader {
        entry: ResourceEntry::conditional(resource_type, handle.clone(), resource, guard),
        handle,
    }
}

/// Drives the export: source -> transform -> assembler -> dispatch queue
pub struct Pipeline {
    source: Arc<dyn RecordSource>,
    sender: DispatchSender,
    threshold: usize,
    patient_limit: u32,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn RecordSource>,
        sender: DispatchSender,
        threshold: usize,
        patient_limit: u32,
    ) -> Self {
        Self {
            source,
            sender,
            threshold,
            patient_limit,
        }
    }

    /// Runs the full export. The terminal marker is enqueued whether the
    /// run completes or aborts.
    pub async fn run(self) -> Result<RunSummary> {
        let outcome = self.run_inner().await;
        if let Err(error) = self.sender.enqueue_terminal().await {
            tracing::warn!(%error, "Failed to enqueue terminal marker");
        }
        outcome
    }

    async fn run_inner(&self) -> Result<RunSummary> {
        let wards = self.source.wards().await?;
        let caregivers = self.source.caregivers().await?;
        let directory = Directory::new(wards, caregivers);
        tracing::info!(
            wards = directory.ward_count(),
            caregivers = directory.caregiver_count(),
            "Preloaded directories"
        );

        let total = match self.patient_limit {
            0 => self.source.patient_count().await?,
            limit => limit.min(self.source.patient_count().await?),
        };
        tracing::info!(patients = total, "Starting export");

        let mut assembler = BundleAssembler::new(self.threshold);
        let mut summary = RunSummary::default();

        for patient_index in 1..=total {
            let patient = match self.source.patient_by_index(patient_index).await {
                Ok(patient) => patient,
                Err(MeridianError::BuilderData(reason)) => {
                    tracing::warn!(patient_index, reason, "Skipping patient");
                    summary.patients_skipped += 1;
                    continue;
                }
                Err(other) => return Err(other),
            };
            self.process_patient(&mut assembler, &directory, &patient, patient_index, &mut summary)
                .await?;
            summary.patients += 1;
        }

        summary.log();
        Ok(summary)
    }

    async fn process_patient(
        &self,
        assembler: &mut BundleAssembler,
        directory: &Directory,
        patient: &PatientRecord,
        patient_index: u32,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let (patient_resource, patient_guard) = match transform::patient(patient) {
            Ok(rendered) => rendered,
            Err(MeridianError::BuilderData(reason)) => {
                tracing::warn!(patient_index, reason, "Skipping unbuildable patient");
                summary.patients_skipped += 1;
                return Ok(());
            }
            Err(other) => return Err(other),
        };
        let patient_header = rendered(ResourceType::Patient, patient_resource, patient_guard);
        let (hospital_resource, hospital_guard) = transform::hospital();
        let hospital_header = rendered(ResourceType::Organization, hospital_resource, hospital_guard);

        for (offset, admission) in patient.admissions.iter().enumerate() {
            let admission_index = (offset + 1) as u32;
            self.process_admission(
                assembler,
                directory,
                patient,
                admission,
                &patient_header,
                &hospital_header,
                patient_index,
                admission_index,
                summary,
            )
            .await?;
            summary.admissions += 1;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_admission(
        &self,
        assembler: &mut BundleAssembler,
        directory: &Directory,
        patient: &PatientRecord,
        admission: &AdmissionRecord,
        patient_header: &RenderedHeader,
        hospital_header: &RenderedHeader,
        patient_index: u32,
        admission_index: u32,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let (header, encounter_handle) = match self.build_header(
            directory,
            admission,
            patient_header,
            hospital_header,
            summary,
        ) {
            Ok(built) => built,
            Err(MeridianError::BuilderData(reason)) => {
                tracing::warn!(
                    patient_index,
                    admission_index,
                    reason,
                    "Skipping unbuildable admission"
                );
                summary.entities_skipped += 1;
                return Ok(());
            }
            Err(other) => return Err(other),
        };
        assembler.begin_admission(header);

        let patient_handle = patient_header.handle.clone();
        let hospital_handle = hospital_header.handle.clone();

        for rx in &admission.prescriptions {
            self.seal_if_full(assembler, patient_index, admission_index, summary)
                .await?;
            let medication_handle =
                assembler.resolve_or_register(CacheKind::Medication, rx.drug_code(), || {
                    let (resource, guard) = transform::medication(rx);
                    ResourceEntry::conditional(ResourceType::Medication, new_handle(), resource, guard)
                })?;
            let administration = transform::medication_administration(
                rx,
                &patient_handle,
                &encounter_handle,
                &medication_handle,
            );
            assembler.add_entry(ResourceEntry::with_handle(
                ResourceType::MedicationAdministration,
                new_handle(),
                administration,
            ));
        }

        for event in &admission.chart_events {
            self.seal_if_full(assembler, patient_index, admission_index, summary)
                .await?;
            let mut resource =
                match transform::chart_observation(event, &patient_handle, &encounter_handle) {
                    Ok(resource) => resource,
                    Err(MeridianError::BuilderData(reason)) => {
                        tracing::warn!(reason, "Skipping chart event");
                        summary.entities_skipped += 1;
                        continue;
                    }
                    Err(other) => return Err(other),
                };
            if let Some(performer) =
                self.resolve_performer(assembler, directory, event.caregiver_id, &hospital_handle)?
            {
                resource["performer"] = serde_json::json!([{"reference": performer}]);
            }
            assembler.add_entry(ResourceEntry::create(ResourceType::Observation, resource));
        }

        for event in &admission.lab_events {
            self.seal_if_full(assembler, patient_index, admission_index, summary)
                .await?;
            let resource =
                match transform::lab_observation(event, &patient_handle, &encounter_handle) {
                    Ok(resource) => resource,
                    Err(MeridianError::BuilderData(reason)) => {
                        tracing::warn!(reason, "Skipping lab event");
                        summary.entities_skipped += 1;
                        continue;
                    }
                    Err(other) => return Err(other),
                };
            assembler.add_entry(ResourceEntry::create(ResourceType::Observation, resource));
        }

        let label = assembler.sequence_label(patient_index, admission_index);
        let sealed = assembler.end_admission();
        self.dispatch_chunk(sealed, label, summary).await?;

        tracing::debug!(
            patient = patient.subject_id,
            admission = admission.admission_id,
            "Admission exported"
        );
        Ok(())
    }

    /// Renders the header set seeded into every chunk of this admission:
    /// patient, hospital, conditions, procedures, ward locations and the
    /// encounter last, so the encounter entry follows everything it
    /// references. Returns the encounter handle events hang off.
    fn build_header(
        &self,
        directory: &Directory,
        admission: &AdmissionRecord,
        patient_header: &RenderedHeader,
        hospital_header: &RenderedHeader,
        summary: &mut RunSummary,
    ) -> Result<(HeaderSet, String)> {
        let mut header = HeaderSet::default();
        header.entries.push(patient_header.entry.clone());
        header.entries.push(hospital_header.entry.clone());

        let mut diagnosis_refs = Vec::new();
        for diagnosis in &admission.diagnoses {
            match transform::condition(diagnosis, &admission.admission_id, &patient_header.handle) {
                Ok((resource, guard)) => {
                    let condition =
                        rendered(ResourceType::Condition, resource, guard);
                    diagnosis_refs.push(DiagnosisReference {
                        handle: condition.handle.clone(),
                        rank: diagnosis.seq_number,
                    });
                    header.entries.push(condition.entry);
                }
                Err(MeridianError::BuilderData(reason)) => {
                    tracing::warn!(reason, "Skipping diagnosis");
                    summary.entities_skipped += 1;
                }
                Err(other) => return Err(other),
            }
        }
        for proc in &admission.procedures {
            match transform::procedure(proc, &admission.admission_id, &patient_header.handle) {
                Ok((resource, guard)) => {
                    let procedure = rendered(ResourceType::Procedure, resource, guard);
                    diagnosis_refs.push(DiagnosisReference {
                        handle: procedure.handle.clone(),
                        rank: proc.seq_number,
                    });
                    header.entries.push(procedure.entry);
                }
                Err(MeridianError::BuilderData(reason)) => {
                    tracing::warn!(reason, "Skipping procedure");
                    summary.entities_skipped += 1;
                }
                Err(other) => return Err(other),
            }
        }

        // one Location entry per distinct ward, one encounter.location
        // element per transfer
        let mut location_refs = Vec::new();
        for transfer in &admission.transfers {
            let ward_key = transfer.ward_id.to_string();
            let handle = match header
                .locations
                .iter()
                .find(|(key, _)| *key == ward_key)
                .map(|(_, handle)| handle.clone())
            {
                Some(handle) => handle,
                None => {
                    let Some(ward) = directory.ward(transfer.ward_id) else {
                        tracing::warn!(ward_id = transfer.ward_id, "Transfer to unknown ward");
                        summary.entities_skipped += 1;
                        continue;
                    };
                    let (resource, guard) =
                        transform::ward_location(ward, &hospital_header.handle);
                    let location = rendered(ResourceType::Location, resource, guard);
                    header.entries.push(location.entry);
                    header.locations.push((ward_key.clone(), location.handle.clone()));
                    location.handle
                }
            };
            location_refs.push(LocationReference {
                handle,
                in_time: transfer.in_time,
                out_time: transfer.out_time,
            });
        }

        let (resource, guard) = transform::encounter(
            admission,
            &patient_header.handle,
            &diagnosis_refs,
            &location_refs,
        )?;
        let encounter = rendered(ResourceType::Encounter, resource, guard);
        let encounter_handle = encounter.handle.clone();
        header.entries.push(encounter.entry);

        Ok((header, encounter_handle))
    }

    /// Resolves the performing practitioner for a chart event, registering
    /// the Practitioner (and its PractitionerRole, when the directory entry
    /// carries one) into the current chunk on first use
    fn resolve_performer(
        &self,
        assembler: &mut BundleAssembler,
        directory: &Directory,
        caregiver_id: Option<i32>,
        hospital_handle: &str,
    ) -> Result<Option<String>> {
        let Some(caregiver_id) = caregiver_id else {
            return Ok(None);
        };
        let key = caregiver_id.to_string();
        if let Some(handle) = assembler.lookup(CacheKind::Practitioner, &key) {
            return Ok(Some(handle));
        }
        let Some(caregiver) = directory.caregiver(caregiver_id) else {
            tracing::warn!(caregiver_id, "Chart event by unknown caregiver");
            return Ok(None);
        };

        let (resource, guard) = transform::practitioner(caregiver);
        let handle = assembler.register(
            CacheKind::Practitioner,
            &key,
            ResourceEntry::conditional(ResourceType::Practitioner, new_handle(), resource, guard),
        )?;
        if let Some((role_resource, role_guard)) =
            transform::practitioner_role(caregiver, &handle, hospital_handle)
        {
            assembler.add_entry(ResourceEntry::conditional(
                ResourceType::PractitionerRole,
                new_handle(),
                role_resource,
                role_guard,
            ));
        }
        Ok(Some(handle))
    }

    /// Seals and dispatches the current chunk when it exceeded the
    /// threshold. Called before each entry family is appended, so an entry
    /// and the referents registered immediately before it always share a
    /// chunk.
    async fn seal_if_full(
        &self,
        assembler: &mut BundleAssembler,
        patient_index: u32,
        admission_index: u32,
        summary: &mut RunSummary,
    ) -> Result<()> {
        if !assembler.is_full() {
            return Ok(());
        }
        let label = assembler.sequence_label(patient_index, admission_index);
        let sealed = assembler.flush();
        self.dispatch_chunk(sealed, label, summary).await
    }

    async fn dispatch_chunk(
        &self,
        sealed: SealedChunk,
        label: String,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let payload = sealed.batch.serialize()?;
        tracing::debug!(
            label,
            entries = sealed.batch.len(),
            "Enqueueing chunk"
        );
        self.sender.enqueue(DispatchMessage::data(label, payload)).await?;
        summary.chunks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::source::InMemorySource;
    use crate::dispatch;
    use crate::domain::records::{ChartEventRecord, TransferRecord, WardRecord};
    use std::collections::HashMap;

    fn admission(id: &str, chart_events: Vec<ChartEventRecord>) -> AdmissionRecord {
        AdmissionRecord {
            admission_id: id.to_string(),
            admission_type: None,
            admit_time: None,
            discharge_time: None,
            diagnoses: Vec::new(),
            procedures: Vec::new(),
            transfers: Vec::new(),
            prescriptions: Vec::new(),
            chart_events,
            lab_events: Vec::new(),
        }
    }

    fn chart_event(measurement: &str) -> ChartEventRecord {
        ChartEventRecord {
            measurement: measurement.to_string(),
            value: Some("1".to_string()),
            numeric_value: Some(1.0),
            unit: None,
            caregiver_id: None,
            record_time: None,
        }
    }

    fn patient(subject_id: &str, admissions: Vec<AdmissionRecord>) -> PatientRecord {
        PatientRecord {
            subject_id: subject_id.to_string(),
            gender: None,
            birth_date: None,
            death_date: None,
            admissions,
        }
    }

    async fn drain(mut rx: dispatch::DispatchReceiver) -> Vec<DispatchMessage> {
        let mut messages = Vec::new();
        while let Some(message) = rx.recv().await {
            let terminal = message.terminal;
            messages.push(message);
            if terminal {
                break;
            }
        }
        messages
    }

    #[tokio::test]
    async fn test_single_admission_yields_one_chunk_and_terminal() {
        let source = InMemorySource::new(
            vec![patient("1", vec![admission("100", vec![chart_event("HR")])])],
            HashMap::new(),
            HashMap::new(),
        );
        let (tx, rx) = dispatch::channel(16);
        let pipeline = Pipeline::new(Arc::new(source), tx, 100, 0);

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.patients, 1);
        assert_eq!(summary.admissions, 1);
        assert_eq!(summary.chunks, 1);

        let messages = drain(rx).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sequence_label, "1_1_1");
        assert!(messages[1].terminal);
    }

    #[tokio::test]
    async fn test_threshold_splits_admission_into_labeled_chunks() {
        let events = (0..5).map(|i| chart_event(&format!("m{i}"))).collect();
        let source = InMemorySource::new(
            vec![patient("1", vec![admission("100", events)])],
            HashMap::new(),
            HashMap::new(),
        );
        let (tx, rx) = dispatch::channel(16);
        // header is patient + hospital + encounter = 3 entries
        let pipeline = Pipeline::new(Arc::new(source), tx, 5, 0);

        let summary = pipeline.run().await.unwrap();
        assert!(summary.chunks > 1);

        let messages = drain(rx).await;
        let labels: Vec<_> = messages
            .iter()
            .filter(|m| !m.terminal)
            .map(|m| m.sequence_label.as_str())
            .collect();
        assert_eq!(labels[0], "1_1_1");
        assert_eq!(labels[1], "1_1_2");
    }

    #[tokio::test]
    async fn test_terminal_enqueued_even_when_source_fails() {
        struct FailingSource;

        #[async_trait::async_trait]
        impl RecordSource for FailingSource {
            async fn patient_count(&self) -> Result<u32> {
                Err(MeridianError::Source("connection reset".to_string()))
            }
            async fn patient_by_index(&self, _index: u32) -> Result<PatientRecord> {
                Err(MeridianError::Source("connection reset".to_string()))
            }
            async fn wards(&self) -> Result<HashMap<i32, WardRecord>> {
                Ok(HashMap::new())
            }
            async fn caregivers(
                &self,
            ) -> Result<HashMap<i32, crate::domain::records::CaregiverRecord>> {
                Ok(HashMap::new())
            }
        }

        let (tx, mut rx) = dispatch::channel(16);
        let pipeline = Pipeline::new(Arc::new(FailingSource), tx, 100, 0);

        assert!(pipeline.run().await.is_err());
        assert!(rx.recv().await.unwrap().terminal);
    }

    #[tokio::test]
    async fn test_transfers_to_same_ward_share_one_location() {
        let mut adm = admission("100", Vec::new());
        adm.transfers = vec![
            TransferRecord {
                ward_id: 52,
                in_time: None,
                out_time: None,
            },
            TransferRecord {
                ward_id: 52,
                in_time: None,
                out_time: None,
            },
        ];
        let wards = HashMap::from([(
            52,
            WardRecord {
                ward_id: 52,
                care_unit: Some("MICU".to_string()),
            },
        )]);
        let source = InMemorySource::new(vec![patient("1", vec![adm])], wards, HashMap::new());
        let (tx, rx) = dispatch::channel(16);
        let pipeline = Pipeline::new(Arc::new(source), tx, 100, 0);
        pipeline.run().await.unwrap();

        let messages = drain(rx).await;
        let bundle: serde_json::Value = serde_json::from_str(&messages[0].payload).unwrap();
        let entries = bundle["entry"].as_array().unwrap();
        let locations: Vec<_> = entries
            .iter()
            .filter(|e| e["resource"]["resourceType"] == "Location")
            .collect();
        assert_eq!(locations.len(), 1);

        let encounter = entries
            .iter()
            .find(|e| e["resource"]["resourceType"] == "Encounter")
            .unwrap();
        assert_eq!(encounter["resource"]["location"].as_array().unwrap().len(), 2);
    }
}
