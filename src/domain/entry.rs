//! Transaction bundle entries
//!
//! A [`ResourceEntry`] is one resource queued for submission inside an
//! atomic transaction bundle: the rendered FHIR payload, an optional
//! transient `urn:uuid` handle other entries in the same bundle may
//! reference, and an optional conditional-create guard derived from the
//! resource's natural identifier.
//!
//! An entry without a guard is created unconditionally. An entry with a
//! guard is always submitted as "create only if no match" — the destination
//! server, not this client, is the deduplication authority across bundles.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

/// Logical FHIR resource type of a bundle entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Patient,
    Organization,
    Encounter,
    Condition,
    Procedure,
    Location,
    Practitioner,
    PractitionerRole,
    Medication,
    MedicationAdministration,
    Observation,
}

impl ResourceType {
    /// FHIR resource type name, also the request URL within a transaction
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Organization => "Organization",
            ResourceType::Encounter => "Encounter",
            ResourceType::Condition => "Condition",
            ResourceType::Procedure => "Procedure",
            ResourceType::Location => "Location",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::PractitionerRole => "PractitionerRole",
            ResourceType::Medication => "Medication",
            ResourceType::MedicationAdministration => "MedicationAdministration",
            ResourceType::Observation => "Observation",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mints a fresh transient handle, valid only within one bundle
pub fn new_handle() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}

/// One resource queued for submission in a transaction bundle
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEntry {
    /// Logical type of the resource
    pub resource_type: ResourceType,
    /// Rendered FHIR payload
    pub resource: Value,
    /// Transient in-bundle handle (`urn:uuid:...`), if the entry is
    /// referenced by other entries in the same bundle
    pub full_url: Option<String>,
    /// Conditional-create guard (`If-None-Exist` search), derived from the
    /// resource's natural identifier
    pub if_none_exist: Option<String>,
}

impl ResourceEntry {
    /// Unconditional create without a handle; for resources nothing else
    /// references (observations)
    pub fn create(resource_type: ResourceType, resource: Value) -> Self {
        Self {
            resource_type,
            resource,
            full_url: None,
            if_none_exist: None,
        }
    }

    /// Unconditional create carrying a transient handle; for resources
    /// referenced within the bundle but produced at most once
    /// (medication administrations)
    pub fn with_handle(resource_type: ResourceType, handle: String, resource: Value) -> Self {
        Self {
            resource_type,
            resource,
            full_url: Some(handle),
            if_none_exist: None,
        }
    }

    /// Conditional create: submitted with a "create only if no match"
    /// guard keyed on the natural identifier.
    ///
    /// Correctness across chunk boundaries depends on the destination
    /// honoring the guard atomically within a transaction bundle; a server
    /// without conditional-create support will duplicate shared entities.
    pub fn conditional(
        resource_type: ResourceType,
        handle: String,
        resource: Value,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            resource,
            full_url: Some(handle),
            if_none_exist: Some(condition.into()),
        }
    }

    /// Handle other entries may use to reference this one
    pub fn handle(&self) -> Option<&str> {
        self.full_url.as_deref()
    }

    /// Renders the entry in FHIR transaction bundle form
    pub fn to_bundle_entry(&self) -> Value {
        let mut request = json!({
            "method": "POST",
            "url": self.resource_type.as_str(),
        });
        if let Some(condition) = &self.if_none_exist {
            request["ifNoneExist"] = json!(condition);
        }

        let mut entry = json!({
            "resource": self.resource,
            "request": request,
        });
        if let Some(full_url) = &self.full_url {
            entry["fullUrl"] = json!(full_url);
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_is_urn_uuid() {
        let handle = new_handle();
        assert!(handle.starts_with("urn:uuid:"));
        assert_ne!(handle, new_handle());
    }

    #[test]
    fn test_unconditional_entry_has_no_guard() {
        let entry = ResourceEntry::create(
            ResourceType::Observation,
            json!({"resourceType": "Observation"}),
        );
        assert!(entry.full_url.is_none());
        assert!(entry.if_none_exist.is_none());

        let rendered = entry.to_bundle_entry();
        assert_eq!(rendered["request"]["method"], "POST");
        assert_eq!(rendered["request"]["url"], "Observation");
        assert!(rendered["request"].get("ifNoneExist").is_none());
        assert!(rendered.get("fullUrl").is_none());
    }

    #[test]
    fn test_conditional_entry_renders_guard() {
        let handle = new_handle();
        let entry = ResourceEntry::conditional(
            ResourceType::Patient,
            handle.clone(),
            json!({"resourceType": "Patient"}),
            "identifier=http://example.org/patients|42",
        );

        let rendered = entry.to_bundle_entry();
        assert_eq!(rendered["fullUrl"], handle.as_str());
        assert_eq!(
            rendered["request"]["ifNoneExist"],
            "identifier=http://example.org/patients|42"
        );
    }

    #[test]
    fn test_with_handle_entry() {
        let handle = new_handle();
        let entry = ResourceEntry::with_handle(
            ResourceType::MedicationAdministration,
            handle.clone(),
            json!({"resourceType": "MedicationAdministration"}),
        );
        assert_eq!(entry.handle(), Some(handle.as_str()));
        assert!(entry.if_none_exist.is_none());
    }
}
