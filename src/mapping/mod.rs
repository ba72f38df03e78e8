//! The mapping registry data model: `FieldMapping`, `ResourceMapping`,
//! `MappingRegistry`, `TransformationContext`. Field and shape naming is
//! generalised from the teacher's `DatabaseViewMapping`/`FieldMapping`
//! entities (`application/usecases/database_view_mapping.rs`,
//! `domain/entities/database_view_mapping.rs`) onto the declarative,
//! FHIR-direction-aware shape the specification requires.

use crate::lookup::CodeLookupTable;
use crate::utils::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PRIMITIVE_WHITELIST: &[&str] = &[
    "string", "integer", "decimal", "boolean", "date", "dateTime", "time", "instant", "code",
    "uri", "url", "canonical", "oid", "uuid", "id", "markdown", "base64Binary", "unsignedInt",
    "positiveInt",
];

/// Declared type → FHIR element types it may be compared against (§6).
pub fn compatible_fhir_types(declared: &str) -> Option<&'static [&'static str]> {
    Some(match declared {
        "string" => &["string", "markdown", "id", "code", "uri", "url", "canonical", "oid", "uuid"],
        "integer" => &["integer", "unsignedInt", "positiveInt"],
        "decimal" => &["decimal"],
        "boolean" => &["boolean"],
        "date" => &["date", "dateTime", "instant"],
        "dateTime" => &["dateTime", "instant"],
        "code" => &["code", "string"],
        _ => return None,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "JSON_TO_FHIR")]
    JsonToFhir,
    #[serde(rename = "FHIR_TO_JSON")]
    FhirToJson,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_table: Option<String>,
    /// When present, forces this field's lookup through `lookupSource`
    /// (requires a bidirectional table) regardless of the mapping's own
    /// direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_source_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldMapping {
    fn validate_shape(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::Config("field mapping id must not be empty".into()));
        }
        if self.target_path.trim().is_empty() {
            return Err(EngineError::Config(format!(
                "field mapping '{}' has an empty targetPath",
                self.id
            )));
        }
        if self.required && self.source_path.is_none() && self.default_value.is_none() {
            return Err(EngineError::Config(format!(
                "field mapping '{}' is required but has neither sourcePath nor defaultValue",
                self.id
            )));
        }
        if let Some(dt) = &self.data_type {
            if !PRIMITIVE_WHITELIST.contains(&dt.as_str()) {
                return Err(EngineError::Config(format!(
                    "field mapping '{}' has unknown dataType '{}'",
                    self.id, dt
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMapping {
    pub id: String,
    pub name: String,
    pub source_type: String,
    pub target_type: String,
    #[serde(default)]
    pub version: String,
    pub direction: Direction,
    pub field_mappings: Vec<FieldMapping>,
}

impl ResourceMapping {
    pub fn fhir_side(&self) -> &str {
        match self.direction {
            Direction::JsonToFhir => &self.target_type,
            Direction::FhirToJson => &self.source_type,
        }
    }

    fn validate_shape(&self) -> EngineResult<()> {
        if self.id.trim().is_empty() {
            return Err(EngineError::Config("resource mapping id must not be empty".into()));
        }
        if self.source_type.trim().is_empty() || self.target_type.trim().is_empty() {
            return Err(EngineError::Config(format!(
                "resource mapping '{}' must set both sourceType and targetType",
                self.id
            )));
        }

        let mut seen = std::collections::HashSet::with_capacity(self.field_mappings.len());
        for field in &self.field_mappings {
            field.validate_shape()?;
            if !seen.insert(field.id.clone()) {
                return Err(EngineError::Config(format!(
                    "resource mapping '{}' has duplicate field id '{}'",
                    self.id, field.id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct TransformationContext {
    pub organization_id: Option<String>,
    pub facility_id: Option<String>,
    pub tenant_id: Option<String>,
    pub variables: HashMap<String, serde_json::Value>,
    pub settings: HashMap<String, String>,
}

impl TransformationContext {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct MappingRegistry {
    pub fhir_version: String,
    pub loaded_at: DateTime<Utc>,
    pub resource_mappings: Vec<ResourceMapping>,
    pub lookup_tables: HashMap<String, CodeLookupTable>,

    by_source_and_direction: HashMap<(String, Direction), usize>,
    by_id: HashMap<String, usize>,
}

impl MappingRegistry {
    /// Build the registry's indices from already-loaded, already-validated
    /// mappings and lookup tables. Per §9's open question, when multiple
    /// mappings share `(sourceType, direction)` only the first loaded one is
    /// indexed; callers that care about collisions should inspect
    /// `resource_mappings` directly (the loader logs a warning).
    pub fn new(
        fhir_version: String,
        resource_mappings: Vec<ResourceMapping>,
        lookup_tables: HashMap<String, CodeLookupTable>,
    ) -> EngineResult<Self> {
        for rm in &resource_mappings {
            rm.validate_shape()?;
        }

        let mut by_source_and_direction = HashMap::with_capacity(resource_mappings.len());
        let mut by_id = HashMap::with_capacity(resource_mappings.len());

        for (idx, rm) in resource_mappings.iter().enumerate() {
            by_source_and_direction
                .entry((rm.source_type.clone(), rm.direction))
                .or_insert(idx);
            if by_id.insert(rm.id.clone(), idx).is_some() {
                return Err(EngineError::Config(format!(
                    "duplicate resource mapping id '{}'",
                    rm.id
                )));
            }
        }

        Ok(Self {
            fhir_version,
            loaded_at: Utc::now(),
            resource_mappings,
            lookup_tables,
            by_source_and_direction,
            by_id,
        })
    }

    pub fn find_by_source_and_direction(
        &self,
        source_type: &str,
        direction: Direction,
    ) -> Option<&ResourceMapping> {
        self.by_source_and_direction
            .get(&(source_type.to_string(), direction))
            .map(|&idx| &self.resource_mappings[idx])
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ResourceMapping> {
        self.by_id.get(id).map(|&idx| &self.resource_mappings[idx])
    }

    pub fn get_lookup_table(&self, id: &str) -> Option<&CodeLookupTable> {
        self.lookup_tables.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mapping(id: &str) -> ResourceMapping {
        ResourceMapping {
            id: id.into(),
            name: "Patient mapping".into(),
            source_type: "PatientRecord".into(),
            target_type: "Patient".into(),
            version: "1".into(),
            direction: Direction::JsonToFhir,
            field_mappings: vec![FieldMapping {
                id: "patient-identifier".into(),
                source_path: Some("patientId".into()),
                target_path: "identifier[0].value".into(),
                data_type: None,
                transform_expression: None,
                condition: None,
                validator: None,
                required: true,
                default_value: None,
                lookup_table: None,
                lookup_source_field: None,
                description: None,
            }],
        }
    }

    #[test]
    fn registry_indexes_by_source_and_direction() {
        let registry =
            MappingRegistry::new("4.0.1".into(), vec![sample_mapping("m1")], HashMap::new()).unwrap();
        let found = registry
            .find_by_source_and_direction("PatientRecord", Direction::JsonToFhir)
            .unwrap();
        assert_eq!(found.id, "m1");
        assert!(registry
            .find_by_source_and_direction("PatientRecord", Direction::FhirToJson)
            .is_none());
    }

    #[test]
    fn duplicate_mapping_ids_rejected() {
        let err = MappingRegistry::new(
            "4.0.1".into(),
            vec![sample_mapping("dup"), sample_mapping("dup")],
            HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn required_field_without_source_or_default_rejected() {
        let mut mapping = sample_mapping("m1");
        mapping.field_mappings[0].source_path = None;
        mapping.field_mappings[0].default_value = None;
        let err = MappingRegistry::new("4.0.1".into(), vec![mapping], HashMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn first_match_wins_on_collision() {
        let mut second = sample_mapping("m2");
        second.name = "Duplicate route".into();
        let registry = MappingRegistry::new(
            "4.0.1".into(),
            vec![sample_mapping("m1"), second],
            HashMap::new(),
        )
        .unwrap();
        let found = registry
            .find_by_source_and_direction("PatientRecord", Direction::JsonToFhir)
            .unwrap();
        assert_eq!(found.id, "m1");
    }
}
