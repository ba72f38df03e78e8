//! The FHIR structure catalogue (§6 "FHIR library bridge"): a small trait
//! abstracting over "does this resource type exist" and "does this element
//! name exist on it", plus a static default implementation seeded with the
//! common R4 resource types so the engine works without linking a full FHIR
//! schema library. Production deployments can supply their own
//! [`FhirStructureCatalogue`] backed by a real structure definitions package.

use std::collections::HashMap;

pub trait FhirStructureCatalogue: Send + Sync {
    /// Returns `true` if `type_name` is a known FHIR resource type.
    fn resource(&self, type_name: &str) -> bool;

    /// Returns `true` if `child_name` is a known first-level element of
    /// `parent_type`. Used only for the permissive first-segment path check
    /// (§9): deeper path segments are not validated against the catalogue.
    fn child_type_name(&self, parent_type: &str, child_name: &str) -> bool;
}

/// A hand-seeded catalogue of common FHIR R4 resources and their top-level
/// elements. Good enough for the permissive, first-segment-only validation
/// the specification calls for; not a substitute for a real conformance
/// library.
pub struct StaticStructureCatalogue {
    resources: HashMap<&'static str, &'static [&'static str]>,
}

impl Default for StaticStructureCatalogue {
    fn default() -> Self {
        let mut resources = HashMap::new();
        resources.insert(
            "Patient",
            &[
                "identifier", "active", "name", "telecom", "gender", "birthDate", "deceasedBoolean",
                "deceasedDateTime", "address", "maritalStatus", "contact", "communication",
                "generalPractitioner", "managingOrganization", "link",
            ][..],
        );
        resources.insert(
            "Encounter",
            &[
                "identifier", "status", "class", "type", "subject", "participant", "period",
                "reasonCode", "diagnosis", "location", "serviceProvider",
            ][..],
        );
        resources.insert(
            "Observation",
            &[
                "identifier", "status", "category", "code", "subject", "encounter",
                "effectiveDateTime", "issued", "performer", "valueQuantity", "valueString",
                "valueCodeableConcept", "interpretation", "note", "referenceRange",
            ][..],
        );
        resources.insert(
            "Practitioner",
            &["identifier", "active", "name", "telecom", "address", "gender", "birthDate", "qualification"][..],
        );
        resources.insert(
            "Organization",
            &["identifier", "active", "type", "name", "telecom", "address", "partOf", "contact"][..],
        );
        resources.insert(
            "Location",
            &["identifier", "status", "name", "description", "type", "telecom", "address", "managingOrganization"][..],
        );
        resources.insert(
            "Condition",
            &[
                "identifier", "clinicalStatus", "verificationStatus", "category", "severity",
                "code", "subject", "encounter", "onsetDateTime", "recordedDate", "note",
            ][..],
        );
        resources.insert(
            "Procedure",
            &[
                "identifier", "status", "category", "code", "subject", "encounter",
                "performedDateTime", "performer", "location", "reasonCode", "note",
            ][..],
        );
        Self { resources }
    }
}

impl FhirStructureCatalogue for StaticStructureCatalogue {
    fn resource(&self, type_name: &str) -> bool {
        self.resources.contains_key(type_name)
    }

    fn child_type_name(&self, parent_type: &str, child_name: &str) -> bool {
        self.resources
            .get(parent_type)
            .map(|elements| elements.contains(&child_name))
            .unwrap_or(false)
    }
}
