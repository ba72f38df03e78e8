//! End-to-end scenarios from the specification's testable-properties
//! section: one integration test per concrete scenario, built directly on
//! the public facade rather than the HTTP surface.

use fhir_mapping_engine::interpreter;
use fhir_mapping_engine::lookup::{CodeLookupTable, CodeMapping};
use fhir_mapping_engine::mapping::{Direction, FieldMapping, MappingRegistry, ResourceMapping, TransformationContext};
use fhir_mapping_engine::tree::TreeValue;
use fhir_mapping_engine::utils::error::EngineError;
use serde_json::json;
use std::collections::HashMap;

fn field(
    id: &str,
    source_path: Option<&str>,
    target_path: &str,
    required: bool,
) -> FieldMapping {
    FieldMapping {
        id: id.into(),
        source_path: source_path.map(String::from),
        target_path: target_path.into(),
        data_type: None,
        transform_expression: None,
        condition: None,
        validator: None,
        required,
        default_value: None,
        lookup_table: None,
        lookup_source_field: None,
        description: None,
    }
}

fn gender_lookup_table() -> CodeLookupTable {
    CodeLookupTable::new(
        "gender",
        "Gender",
        "internal",
        "http://hl7.org/fhir/administrative-gender",
        true,
        None,
        None,
        vec![
            CodeMapping { source_code: "M".into(), target_code: "male".into(), display: None },
            CodeMapping { source_code: "F".into(), target_code: "female".into(), display: None },
        ],
    )
    .build()
    .unwrap()
}

fn base_fields() -> Vec<FieldMapping> {
    let mut identifier = field("patient-identifier", Some("patientId"), "identifier[0].value", true);
    identifier.default_value = None;

    let mut identifier_system = field("identifier-system", None, "identifier[0].system", false);
    identifier_system.default_value = Some(json!("$ctx.settings['identifierSystem']"));

    let given = field("given", Some("firstName"), "name[0].given[0]", false);
    let family = field("family", Some("lastName"), "name[0].family", false);

    let mut gender = field("gender", Some("gender"), "gender", false);
    gender.lookup_table = Some("gender".into());

    vec![identifier, identifier_system, given, family, gender]
}

fn forward_mapping(fields: Vec<FieldMapping>) -> ResourceMapping {
    ResourceMapping {
        id: "patient-in".into(),
        name: "Patient inbound mapping".into(),
        source_type: "PatientRecord".into(),
        target_type: "Patient".into(),
        version: "1".into(),
        direction: Direction::JsonToFhir,
        field_mappings: fields,
    }
}

/// Swap `sourcePath`/`targetPath` on fields that have both, dropping
/// default-value-only fields (like the `$ctx`-sourced identifier system)
/// that have no natural counterpart on the reverse side.
fn reverse_mapping(fields: Vec<FieldMapping>) -> ResourceMapping {
    let swapped = fields
        .into_iter()
        .filter_map(|f| {
            let source_path = f.source_path?;
            Some(FieldMapping { source_path: Some(f.target_path), target_path: source_path, ..f })
        })
        .collect();
    ResourceMapping {
        id: "patient-out".into(),
        name: "Patient outbound mapping".into(),
        source_type: "Patient".into(),
        target_type: "PatientRecord".into(),
        version: "1".into(),
        direction: Direction::FhirToJson,
        field_mappings: swapped,
    }
}

fn lookup_tables() -> HashMap<String, CodeLookupTable> {
    let mut tables = HashMap::new();
    tables.insert("gender".to_string(), gender_lookup_table());
    tables
}

fn context_with_identifier_system() -> TransformationContext {
    let mut ctx = TransformationContext::new();
    ctx.settings.insert("identifierSystem".to_string(), "urn:oid:2.16.840.1.113883.4.1".to_string());
    ctx
}

#[test]
fn scenario_1_minimal_json_to_fhir() {
    let mapping = forward_mapping(base_fields());
    let source = TreeValue::from_json(json!({
        "patientId": "P123",
        "firstName": "John",
        "lastName": "Doe",
        "gender": "M"
    }));
    let out = interpreter::transform(&mapping, &source, &context_with_identifier_system(), &lookup_tables())
        .unwrap();
    assert_eq!(
        out.to_json(),
        json!({
            "resourceType": "Patient",
            "identifier": [{"value": "P123", "system": "urn:oid:2.16.840.1.113883.4.1"}],
            "name": [{"given": ["John"], "family": "Doe"}],
            "gender": "male"
        })
    );
}

#[test]
fn scenario_2_fhir_to_json_reverse() {
    let forward = forward_mapping(base_fields());
    let source = TreeValue::from_json(json!({
        "patientId": "P123",
        "firstName": "John",
        "lastName": "Doe",
        "gender": "M"
    }));
    let fhir = interpreter::transform(&forward, &source, &context_with_identifier_system(), &lookup_tables())
        .unwrap();

    let reverse_fields = vec![
        field("patient-identifier", Some("identifier[0].value"), "patientId", true),
        field("given", Some("name[0].given[0]"), "firstName", false),
        field("family", Some("name[0].family"), "lastName", false),
        {
            let mut g = field("gender", Some("gender"), "gender", false);
            g.lookup_table = Some("gender".into());
            g
        },
    ];
    let reverse = ResourceMapping {
        id: "patient-out".into(),
        name: "Patient outbound mapping".into(),
        source_type: "Patient".into(),
        target_type: "PatientRecord".into(),
        version: "1".into(),
        direction: Direction::FhirToJson,
        field_mappings: reverse_fields,
    };

    let back = interpreter::transform(&reverse, &fhir, &TransformationContext::new(), &lookup_tables()).unwrap();
    assert_eq!(
        back.to_json(),
        json!({"patientId": "P123", "firstName": "John", "lastName": "Doe", "gender": "M"})
    );
}

#[test]
fn scenario_3_required_field_missing() {
    let mapping = forward_mapping(base_fields());
    let source = TreeValue::from_json(json!({"firstName": "John", "lastName": "Doe", "gender": "M"}));
    let err = interpreter::transform(&mapping, &source, &context_with_identifier_system(), &lookup_tables())
        .unwrap_err();
    match err {
        EngineError::Field { field_id, .. } => assert_eq!(field_id, "patient-identifier"),
        other => panic!("expected Field error, got {:?}", other),
    }
}

#[test]
fn scenario_4_lookup_miss() {
    let mut fields = base_fields();
    let gender_field = fields.iter_mut().find(|f| f.id == "gender").unwrap();
    gender_field.required = true;
    let mapping = forward_mapping(fields);
    let source = TreeValue::from_json(json!({
        "patientId": "P123", "firstName": "John", "lastName": "Doe", "gender": "X"
    }));
    let err = interpreter::transform(&mapping, &source, &context_with_identifier_system(), &lookup_tables())
        .unwrap_err();
    match err {
        EngineError::Field { field_id, source } => {
            assert_eq!(field_id, "gender");
            assert!(matches!(*source, EngineError::LookupMiss { .. }));
        }
        other => panic!("expected Field(LookupMiss) error, got {:?}", other),
    }
}

#[test]
fn scenario_5_condition_gating() {
    let mut fields = base_fields();
    let mut ssn_field = field("ssn-identifier", Some("ssn"), "identifier[1].value", false);
    ssn_field.condition = Some("ssn != null".into());
    fields.push(ssn_field);
    let mapping = forward_mapping(fields);

    let without_ssn = TreeValue::from_json(json!({
        "patientId": "P123", "firstName": "John", "lastName": "Doe", "gender": "M"
    }));
    let out = interpreter::transform(&mapping, &without_ssn, &context_with_identifier_system(), &lookup_tables())
        .unwrap();
    assert_eq!(out.to_json()["identifier"].as_array().unwrap().len(), 1);

    let with_ssn = TreeValue::from_json(json!({
        "patientId": "P123", "firstName": "John", "lastName": "Doe", "gender": "M", "ssn": "999-99-9999"
    }));
    let out = interpreter::transform(&mapping, &with_ssn, &context_with_identifier_system(), &lookup_tables())
        .unwrap();
    assert_eq!(out.to_json()["identifier"].as_array().unwrap().len(), 2);
}

#[test]
fn scenario_6_transform_uppercase() {
    let mut fields = base_fields();
    let family_field = fields.iter_mut().find(|f| f.id == "family").unwrap();
    family_field.transform_expression = Some("fn:uppercase(value)".into());
    let mapping = forward_mapping(fields);
    let source = TreeValue::from_json(json!({
        "patientId": "P123", "firstName": "John", "lastName": "Doe", "gender": "M"
    }));
    let out = interpreter::transform(&mapping, &source, &context_with_identifier_system(), &lookup_tables())
        .unwrap();
    assert_eq!(out.to_json()["name"][0]["family"], json!("DOE"));
}

#[test]
fn registry_construction_from_scenario_mappings() {
    let registry = MappingRegistry::new(
        "4.0.1".to_string(),
        vec![forward_mapping(base_fields()), reverse_mapping(base_fields())],
        lookup_tables(),
    )
    .unwrap();
    assert!(registry.find_by_id("patient-in").is_some());
    assert!(registry.find_by_id("patient-out").is_some());
}
