//! Record to FHIR payload rendering
//!
//! Static, field-by-field mapping from builder-boundary records to FHIR
//! JSON payloads. Each renderer for a keyed resource also returns the
//! conditional-create guard derived from the resource's natural identifier,
//! so the same source row always produces the identical idempotency
//! condition no matter which chunk it lands in.
//!
//! Cross-entity links are passed in as transient bundle handles; the
//! renderers never hold object references to other resources.

use crate::domain::records::{
    AdmissionRecord, CaregiverRecord, ChartEventRecord, DiagnosisRecord, LabEventRecord,
    PatientRecord, PrescriptionRecord, ProcedureRecord, WardRecord,
};
use crate::domain::{MeridianError, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Base URI for source-derived identifier systems
pub const IDENTIFIER_BASE: &str = "http://fhir.meridian.example/identifiers";

fn system(kind: &str) -> String {
    format!("{IDENTIFIER_BASE}/{kind}")
}

/// Conditional-create guard for a natural identifier
pub fn identifier_condition(system: &str, value: &str) -> String {
    format!("identifier={system}|{value}")
}

fn fhir_datetime(ts: &Option<DateTime<Utc>>) -> Value {
    match ts {
        Some(t) => json!(t.to_rfc3339()),
        None => Value::Null,
    }
}

/// Renders the subject Patient; returns the payload and its guard
pub fn patient(record: &PatientRecord) -> Result<(Value, String)> {
    if record.subject_id.trim().is_empty() {
        return Err(MeridianError::BuilderData(
            "patient record without subject id".to_string(),
        ));
    }
    let sys = system("patient");
    let mut resource = json!({
        "resourceType": "Patient",
        "identifier": [{"system": sys, "value": record.subject_id}],
    });
    if let Some(gender) = &record.gender {
        resource["gender"] = json!(match gender.as_str() {
            "M" | "m" => "male",
            "F" | "f" => "female",
            other => other,
        });
    }
    if record.birth_date.is_some() {
        resource["birthDate"] = json!(record
            .birth_date
            .as_ref()
            .map(|d| d.format("%Y-%m-%d").to_string()));
    }
    if record.death_date.is_some() {
        resource["deceasedDateTime"] = fhir_datetime(&record.death_date);
    }
    let condition = identifier_condition(&sys, &record.subject_id);
    Ok((resource, condition))
}

/// Renders the top-level hospital Organization every location and role
/// hangs off
pub fn hospital() -> (Value, String) {
    let sys = system("organization");
    let resource = json!({
        "resourceType": "Organization",
        "identifier": [{"system": sys, "value": "hospital"}],
        "type": [{"coding": [{
            "system": "http://hl7.org/fhir/organization-type",
            "code": "prov",
            "display": "Healthcare Provider",
        }]}],
        "name": "Meridian Hospital",
    });
    (resource, identifier_condition(&sys, "hospital"))
}

/// Renders a Condition for one admission diagnosis
pub fn condition(
    diagnosis: &DiagnosisRecord,
    admission_id: &str,
    patient_handle: &str,
) -> Result<(Value, String)> {
    if diagnosis.icd_code.trim().is_empty() {
        return Err(MeridianError::BuilderData(format!(
            "diagnosis without ICD code in admission {admission_id}"
        )));
    }
    let sys = system("condition");
    let value = format!("{}_{}", admission_id, diagnosis.seq_number);
    let resource = json!({
        "resourceType": "Condition",
        "identifier": [{"system": sys, "value": value}],
        "code": {"coding": [{
            "system": "http://hl7.org/fhir/sid/icd-9-cm",
            "code": diagnosis.icd_code,
            "display": diagnosis.description,
        }]},
        "subject": {"reference": patient_handle},
    });
    Ok((resource, identifier_condition(&sys, &value)))
}

/// Renders a Procedure for one admission procedure row
pub fn procedure(
    proc: &ProcedureRecord,
    admission_id: &str,
    patient_handle: &str,
) -> Result<(Value, String)> {
    if proc.icd_code.trim().is_empty() {
        return Err(MeridianError::BuilderData(format!(
            "procedure without ICD code in admission {admission_id}"
        )));
    }
    let sys = system("procedure");
    let value = format!("{}_{}", admission_id, proc.seq_number);
    let resource = json!({
        "resourceType": "Procedure",
        "identifier": [{"system": sys, "value": value}],
        "status": "completed",
        "code": {"coding": [{
            "system": "http://hl7.org/fhir/sid/icd-9-cm",
            "code": proc.icd_code,
            "display": proc.description,
        }]},
        "subject": {"reference": patient_handle},
    });
    Ok((resource, identifier_condition(&sys, &value)))
}

/// Renders a ward Location managed by the hospital organization
pub fn ward_location(ward: &WardRecord, organization_handle: &str) -> (Value, String) {
    let sys = system("ward");
    let value = ward.ward_id.to_string();
    let resource = json!({
        "resourceType": "Location",
        "identifier": [{"system": sys, "value": value}],
        "name": ward.care_unit.clone().unwrap_or_else(|| format!("Ward {}", ward.ward_id)),
        "managingOrganization": {"reference": organization_handle},
    });
    (resource, identifier_condition(&sys, &value))
}

/// Renders a Practitioner from a caregiver directory entry
pub fn practitioner(caregiver: &CaregiverRecord) -> (Value, String) {
    let sys = system("practitioner");
    let value = caregiver.caregiver_id.to_string();
    let resource = json!({
        "resourceType": "Practitioner",
        "identifier": [{"system": sys, "value": value}],
    });
    (resource, identifier_condition(&sys, &value))
}

/// Renders the PractitionerRole for a caregiver with role data, linking the
/// practitioner to the hospital organization. None when the directory entry
/// carries no title.
pub fn practitioner_role(
    caregiver: &CaregiverRecord,
    practitioner_handle: &str,
    organization_handle: &str,
) -> Option<(Value, String)> {
    let title = caregiver.title.as_deref().filter(|t| !t.is_empty())?;
    let sys = system("practitioner-role");
    let value = format!("role_{}", caregiver.caregiver_id);
    let resource = json!({
        "resourceType": "PractitionerRole",
        "identifier": [{"system": sys, "value": value}],
        "practitioner": {"reference": practitioner_handle},
        "organization": {"reference": organization_handle},
        "code": [{"coding": [{
            "system": system("caregiver-title").as_str(),
            "code": title,
            "display": caregiver.description,
        }]}],
    });
    Some((resource, identifier_condition(&sys, &value)))
}

/// Renders a Medication definition keyed by drug code
pub fn medication(rx: &PrescriptionRecord) -> (Value, String) {
    let sys = system("drug");
    let code = rx.drug_code().to_string();
    let resource = json!({
        "resourceType": "Medication",
        "code": {"coding": [{
            "system": sys,
            "code": code,
            "display": rx.drug_name,
        }]},
    });
    // Medications are matched on their code rather than an identifier
    (resource, format!("code={sys}|{code}"))
}

/// Renders the MedicationAdministration event for a prescription;
/// references the in-bundle medication handle
pub fn medication_administration(
    rx: &PrescriptionRecord,
    patient_handle: &str,
    encounter_handle: &str,
    medication_handle: &str,
) -> Value {
    let mut resource = json!({
        "resourceType": "MedicationAdministration",
        "status": "completed",
        "medicationReference": {"reference": medication_handle},
        "subject": {"reference": patient_handle},
        "context": {"reference": encounter_handle},
    });
    if rx.start.is_some() || rx.end.is_some() {
        resource["effectivePeriod"] = json!({
            "start": fhir_datetime(&rx.start),
            "end": fhir_datetime(&rx.end),
        });
    }
    if let (Some(value), Some(unit)) = (&rx.dose_value, &rx.dose_unit) {
        if let Ok(quantity) = value.parse::<f64>() {
            resource["dosage"] = json!({
                "route": {"text": rx.route},
                "dose": {"value": quantity, "unit": unit},
            });
        }
    }
    resource
}

/// Renders an Observation from a bedside chart event
pub fn chart_observation(
    event: &ChartEventRecord,
    patient_handle: &str,
    encounter_handle: &str,
) -> Result<Value> {
    if event.measurement.trim().is_empty() {
        return Err(MeridianError::BuilderData(
            "chart event without measurement type".to_string(),
        ));
    }
    let mut resource = json!({
        "resourceType": "Observation",
        "status": "final",
        "code": {"text": event.measurement},
        "subject": {"reference": patient_handle},
        "context": {"reference": encounter_handle},
        "effectiveDateTime": fhir_datetime(&event.record_time),
    });
    apply_observation_value(&mut resource, &event.value, &event.numeric_value, &event.unit);
    Ok(resource)
}

/// Renders an Observation from a laboratory event
pub fn lab_observation(
    event: &LabEventRecord,
    patient_handle: &str,
    encounter_handle: &str,
) -> Result<Value> {
    if event.measurement.trim().is_empty() {
        return Err(MeridianError::BuilderData(
            "lab event without measurement type".to_string(),
        ));
    }
    let coding = match &event.loinc_code {
        Some(loinc) => json!({
            "coding": [{"system": "http://loinc.org", "code": loinc}],
            "text": event.measurement,
        }),
        None => json!({"text": event.measurement}),
    };
    let mut resource = json!({
        "resourceType": "Observation",
        "status": "final",
        "category": [{"coding": [{
            "system": "http://hl7.org/fhir/observation-category",
            "code": "laboratory",
        }]}],
        "code": coding,
        "subject": {"reference": patient_handle},
        "context": {"reference": encounter_handle},
        "effectiveDateTime": fhir_datetime(&event.record_time),
    });
    if event.abnormal {
        resource["interpretation"] = json!({"coding": [{
            "system": "http://hl7.org/fhir/v2/0078",
            "code": "A",
            "display": "Abnormal",
        }]});
    }
    apply_observation_value(&mut resource, &event.value, &event.numeric_value, &event.unit);
    Ok(resource)
}

fn apply_observation_value(
    resource: &mut Value,
    value: &Option<String>,
    numeric: &Option<f64>,
    unit: &Option<String>,
) {
    match numeric {
        Some(n) => {
            resource["valueQuantity"] = json!({
                "value": n,
                "unit": unit,
            });
        }
        None => {
            if let Some(text) = value {
                resource["valueString"] = json!(text);
            }
        }
    }
}

/// Reference to a condition or procedure with its diagnosis rank
pub struct DiagnosisReference {
    pub handle: String,
    pub rank: i32,
}

/// Reference to a ward location with the stay period
pub struct LocationReference {
    pub handle: String,
    pub in_time: Option<DateTime<Utc>>,
    pub out_time: Option<DateTime<Utc>>,
}

/// Renders the admission Encounter. Diagnosis and location references are
/// passed as handles already registered in the current bundle, so the
/// encounter entry can be appended after them.
pub fn encounter(
    admission: &AdmissionRecord,
    patient_handle: &str,
    diagnoses: &[DiagnosisReference],
    locations: &[LocationReference],
) -> Result<(Value, String)> {
    if admission.admission_id.trim().is_empty() {
        return Err(MeridianError::BuilderData(
            "admission record without id".to_string(),
        ));
    }
    let sys = system("encounter");
    let mut resource = json!({
        "resourceType": "Encounter",
        "identifier": [{"system": sys, "value": admission.admission_id}],
        "status": "finished",
        "subject": {"reference": patient_handle},
        "period": {
            "start": fhir_datetime(&admission.admit_time),
            "end": fhir_datetime(&admission.discharge_time),
        },
    });
    if let Some(admission_type) = &admission.admission_type {
        resource["type"] = json!([{"text": admission_type}]);
    }
    if !diagnoses.is_empty() {
        resource["diagnosis"] = Value::Array(
            diagnoses
                .iter()
                .map(|d| {
                    json!({
                        "condition": {"reference": d.handle},
                        "rank": d.rank,
                    })
                })
                .collect(),
        );
    }
    if !locations.is_empty() {
        resource["location"] = Value::Array(
            locations
                .iter()
                .map(|l| {
                    json!({
                        "location": {"reference": l.handle},
                        "period": {
                            "start": fhir_datetime(&l.in_time),
                            "end": fhir_datetime(&l.out_time),
                        },
                    })
                })
                .collect(),
        );
    }
    let guard = identifier_condition(&sys, &admission.admission_id);
    Ok((resource, guard))
}
