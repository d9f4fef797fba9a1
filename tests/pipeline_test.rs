//! End-to-end pipeline tests over the in-memory source
//!
//! Each test runs the full producer/consumer pair and inspects the
//! dispatched transaction bundles.

use async_trait::async_trait;
use meridian::adapters::sink::Sink;
use meridian::adapters::source::InMemorySource;
use meridian::core::Pipeline;
use meridian::dispatch::{self, Consumer, DispatchMessage};
use meridian::domain::records::{
    AdmissionRecord, CaregiverRecord, ChartEventRecord, PatientRecord, TransferRecord, WardRecord,
};
use meridian::domain::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn patient(subject_id: &str, admissions: Vec<AdmissionRecord>) -> PatientRecord {
    PatientRecord {
        subject_id: subject_id.to_string(),
        gender: Some("F".to_string()),
        birth_date: None,
        death_date: None,
        admissions,
    }
}

fn admission(id: &str) -> AdmissionRecord {
    AdmissionRecord {
        admission_id: id.to_string(),
        admission_type: Some("EMERGENCY".to_string()),
        admit_time: None,
        discharge_time: None,
        diagnoses: Vec::new(),
        procedures: Vec::new(),
        transfers: Vec::new(),
        prescriptions: Vec::new(),
        chart_events: Vec::new(),
        lab_events: Vec::new(),
    }
}

fn chart_event(measurement: &str, caregiver_id: Option<i32>) -> ChartEventRecord {
    ChartEventRecord {
        measurement: measurement.to_string(),
        value: Some("98".to_string()),
        numeric_value: Some(98.0),
        unit: Some("%".to_string()),
        caregiver_id,
        record_time: None,
    }
}

fn transfer(ward_id: i32) -> TransferRecord {
    TransferRecord {
        ward_id,
        in_time: None,
        out_time: None,
    }
}

fn micu_ward() -> HashMap<i32, WardRecord> {
    HashMap::from([(
        52,
        WardRecord {
            ward_id: 52,
            care_unit: Some("MICU".to_string()),
        },
    )])
}

/// Runs the pipeline and collects every dispatched message, terminal last
async fn run_collect(
    source: InMemorySource,
    threshold: usize,
) -> (Vec<DispatchMessage>, meridian::core::RunSummary) {
    let (tx, mut rx) = dispatch::channel(64);
    let pipeline = Pipeline::new(Arc::new(source), tx, threshold, 0);
    let producer = tokio::spawn(async move { pipeline.run().await });

    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        let terminal = message.terminal;
        messages.push(message);
        if terminal {
            break;
        }
    }
    let summary = producer.await.unwrap().unwrap();
    (messages, summary)
}

fn bundle(message: &DispatchMessage) -> Value {
    serde_json::from_str(&message.payload).unwrap()
}

fn entries(bundle: &Value) -> Vec<Value> {
    bundle["entry"].as_array().unwrap().clone()
}

fn resource_types(bundle: &Value) -> Vec<String> {
    entries(bundle)
        .iter()
        .map(|e| e["resource"]["resourceType"].as_str().unwrap().to_string())
        .collect()
}

fn guards_of(bundle: &Value, resource_type: &str) -> Vec<String> {
    entries(bundle)
        .iter()
        .filter(|e| e["resource"]["resourceType"] == resource_type)
        .map(|e| e["request"]["ifNoneExist"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_oversized_admission_splits_into_self_contained_chunks() {
    let mut adm = admission("100");
    adm.chart_events = (0..5).map(|i| chart_event(&format!("m{i}"), None)).collect();
    let source = InMemorySource::new(
        vec![patient("10006", vec![adm])],
        HashMap::new(),
        HashMap::new(),
    );

    // header is patient + hospital + encounter = 3 entries
    let (messages, summary) = run_collect(source, 6).await;
    assert_eq!(summary.chunks, 2);

    let data: Vec<_> = messages.iter().filter(|m| !m.terminal).collect();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].sequence_label, "1_1_1");
    assert_eq!(data[1].sequence_label, "1_1_2");

    for message in &data {
        let bundle = bundle(message);
        assert_eq!(bundle["resourceType"], "Bundle");
        assert_eq!(bundle["type"], "transaction");

        // every chunk re-seeds the full header set
        let types = resource_types(&bundle);
        assert!(types.contains(&"Patient".to_string()));
        assert!(types.contains(&"Organization".to_string()));
        assert!(types.contains(&"Encounter".to_string()));
    }

    // observations are distributed, none duplicated, none lost
    let first = bundle(data[0]);
    let second = bundle(data[1]);
    let observations = |b: &Value| {
        resource_types(b)
            .iter()
            .filter(|t| *t == "Observation")
            .count()
    };
    assert_eq!(observations(&first) + observations(&second), 5);
    assert!(observations(&first) > 0 && observations(&second) > 0);
}

#[tokio::test]
async fn test_header_guards_identical_across_chunks() {
    let mut adm = admission("100");
    adm.chart_events = (0..5).map(|i| chart_event(&format!("m{i}"), None)).collect();
    let source = InMemorySource::new(
        vec![patient("10006", vec![adm])],
        HashMap::new(),
        HashMap::new(),
    );

    let (messages, _) = run_collect(source, 6).await;
    let data: Vec<_> = messages.iter().filter(|m| !m.terminal).collect();
    assert!(data.len() >= 2);

    let first = bundle(data[0]);
    let second = bundle(data[1]);
    for rt in ["Patient", "Organization", "Encounter"] {
        assert_eq!(guards_of(&first, rt), guards_of(&second, rt), "{rt} guard drifted");
    }
}

#[tokio::test]
async fn test_shared_ward_same_guard_distinct_handles_across_admissions() {
    let mut first = admission("100");
    first.transfers = vec![transfer(52)];
    let mut second = admission("101");
    second.transfers = vec![transfer(52)];

    let source = InMemorySource::new(
        vec![patient("10006", vec![first, second])],
        micu_ward(),
        HashMap::new(),
    );
    let (messages, summary) = run_collect(source, 100).await;
    assert_eq!(summary.admissions, 2);

    let data: Vec<_> = messages.iter().filter(|m| !m.terminal).collect();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].sequence_label, "1_1_1");
    assert_eq!(data[1].sequence_label, "1_2_1");

    let location = |b: &Value| {
        entries(b)
            .into_iter()
            .find(|e| e["resource"]["resourceType"] == "Location")
            .unwrap()
    };
    let first_loc = location(&bundle(data[0]));
    let second_loc = location(&bundle(data[1]));

    // the natural-key guard matches, so the destination deduplicates;
    // the transient handles are bundle-local and differ
    assert_eq!(
        first_loc["request"]["ifNoneExist"],
        second_loc["request"]["ifNoneExist"]
    );
    assert_ne!(first_loc["fullUrl"], second_loc["fullUrl"]);
}

#[tokio::test]
async fn test_referent_precedes_referrer_in_every_chunk() {
    let mut adm = admission("100");
    adm.transfers = vec![transfer(52)];
    adm.chart_events = (0..4).map(|i| chart_event(&format!("m{i}"), Some(17))).collect();

    let caregivers = HashMap::from([(
        17,
        CaregiverRecord {
            caregiver_id: 17,
            title: Some("RN".to_string()),
            description: Some("Nurse".to_string()),
        },
    )]);
    let source = InMemorySource::new(vec![patient("10006", vec![adm])], micu_ward(), caregivers);

    let (messages, _) = run_collect(source, 7).await;
    for message in messages.iter().filter(|m| !m.terminal) {
        let bundle = bundle(message);
        let entries = entries(&bundle);

        let mut seen = Vec::new();
        for entry in &entries {
            if let Some(full_url) = entry["fullUrl"].as_str() {
                seen.push(full_url.to_string());
            }
            // collect every urn:uuid reference inside the resource
            let rendered = entry["resource"].to_string();
            for reference in rendered
                .split('"')
                .filter(|s| s.starts_with("urn:uuid:"))
            {
                assert!(
                    seen.iter().any(|h| h == reference),
                    "entry references {reference} before it appears in bundle {}",
                    message.sequence_label
                );
            }
        }
    }
}

#[tokio::test]
async fn test_practitioner_re_registered_with_same_guard_after_flush() {
    let mut adm = admission("100");
    adm.chart_events = (0..5).map(|i| chart_event(&format!("m{i}"), Some(17))).collect();

    let caregivers = HashMap::from([(
        17,
        CaregiverRecord {
            caregiver_id: 17,
            title: None,
            description: None,
        },
    )]);
    let source = InMemorySource::new(
        vec![patient("10006", vec![adm])],
        HashMap::new(),
        caregivers,
    );

    let (messages, _) = run_collect(source, 6).await;
    let data: Vec<_> = messages.iter().filter(|m| !m.terminal).collect();
    assert!(data.len() >= 2);

    let first_guards = guards_of(&bundle(data[0]), "Practitioner");
    let second_guards = guards_of(&bundle(data[1]), "Practitioner");
    // registered once per chunk, never duplicated within one
    assert_eq!(first_guards.len(), 1);
    assert_eq!(second_guards.len(), 1);
    assert_eq!(first_guards, second_guards);
}

struct RecordingSink {
    labels: Mutex<Vec<String>>,
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, message: &DispatchMessage) -> Result<()> {
        self.labels
            .lock()
            .unwrap()
            .push(message.sequence_label.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_consumer_delivers_all_patients_in_order_then_halts() {
    let patients = (1..=3)
        .map(|i| patient(&i.to_string(), vec![admission(&format!("10{i}"))]))
        .collect();
    let source = InMemorySource::new(patients, HashMap::new(), HashMap::new());

    let (tx, rx) = dispatch::channel(64);
    let sink = Arc::new(RecordingSink {
        labels: Mutex::new(Vec::new()),
    });
    let consumer = Consumer::new(vec![sink.clone()]);
    let consumer_task = tokio::spawn(async move { consumer.run(rx).await });

    let pipeline = Pipeline::new(Arc::new(source), tx, 100, 0);
    let summary = pipeline.run().await.unwrap();
    let stats = consumer_task.await.unwrap();

    assert_eq!(summary.patients, 3);
    assert_eq!(stats.messages, 3);
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(
        *sink.labels.lock().unwrap(),
        vec!["1_1_1", "2_1_1", "3_1_1"]
    );
}

#[tokio::test]
async fn test_medication_pair_lands_in_same_chunk() {
    use meridian::domain::records::PrescriptionRecord;

    let mut adm = admission("100");
    adm.prescriptions = (0..4)
        .map(|i| PrescriptionRecord {
            drug_name: format!("Drug {i}"),
            ndc: Some(format!("0005601707{i}")),
            gsn: None,
            dose_value: Some("5".to_string()),
            dose_unit: Some("mg".to_string()),
            route: Some("PO".to_string()),
            start: None,
            end: None,
        })
        .collect();
    let source = InMemorySource::new(
        vec![patient("10006", vec![adm])],
        HashMap::new(),
        HashMap::new(),
    );

    let (messages, _) = run_collect(source, 6).await;
    for message in messages.iter().filter(|m| !m.terminal) {
        let bundle = bundle(message);
        for entry in entries(&bundle) {
            if entry["resource"]["resourceType"] != "MedicationAdministration" {
                continue;
            }
            let medication_ref = entry["resource"]["medicationReference"]["reference"]
                .as_str()
                .unwrap();
            assert!(
                entries(&bundle)
                    .iter()
                    .any(|e| e["fullUrl"] == medication_ref),
                "administration references a medication outside its chunk"
            );
        }
    }
}

#[tokio::test]
async fn test_patient_limit_caps_the_run() {
    let patients = (1..=5)
        .map(|i| patient(&i.to_string(), vec![admission(&format!("10{i}"))]))
        .collect();
    let source = InMemorySource::new(patients, HashMap::new(), HashMap::new());

    let (tx, mut rx) = dispatch::channel(64);
    let pipeline = Pipeline::new(Arc::new(source), tx, 100, 2);
    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.patients, 2);

    let mut labels = Vec::new();
    while let Some(message) = rx.recv().await {
        if message.terminal {
            break;
        }
        labels.push(message.sequence_label);
    }
    assert_eq!(labels, vec!["1_1_1", "2_1_1"]);
}
