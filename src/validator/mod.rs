//! Load-time validation (§4.5): the nine checks run over a set of resource
//! mappings and lookup tables before they are admitted into a
//! [`crate::mapping::MappingRegistry`]. Grounded on the teacher's
//! `utils/validator.rs` `Validator` type for the *shape* of a validation
//! report (`severity`/`field`/`message` triples), generalised here from
//! validating FHIR resource *instances* to validating *mappings* at load
//! time — the checks themselves are new, built from §3/§4's invariants and
//! the structure catalogue of §6.

pub mod catalogue;

use crate::expr::context;
use crate::expr::parse as parse_expr;
use crate::lookup::CodeLookupTable;
use crate::mapping::{compatible_fhir_types, Direction, ResourceMapping};
use catalogue::FhirStructureCatalogue;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    /// `<mappingId>.<fieldId>` or `<tableId>` — whichever the check concerns.
    pub field: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(Finding { severity: Severity::Error, field: field.into(), message: message.into() });
    }

    fn warn(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(Finding { severity: Severity::Warning, field: field.into(), message: message.into() });
    }
}

/// Run all nine checks. `resource_mappings`/`lookup_tables` are assumed to
/// already satisfy their own struct-level `validate_shape`/`build`
/// invariants (those are enforced unconditionally on construction and are
/// not repeated here); this pass adds the cross-cutting checks that need
/// the full registry in view: FHIR structure catalogue resolution,
/// expression parsability, and lookup-table cross-references.
pub fn validate(
    resource_mappings: &[ResourceMapping],
    lookup_tables: &HashMap<String, CodeLookupTable>,
    catalogue: &dyn FhirStructureCatalogue,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    for table in lookup_tables.values() {
        check_lookup_table_invariants(table, &mut result);
    }

    for mapping in resource_mappings {
        check_resource_mapping(mapping, lookup_tables, catalogue, &mut result);
    }

    tracing::debug!(
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        mappings = resource_mappings.len(),
        "validation pass complete"
    );
    result
}

/// Check 1: lookup table invariants. `CodeLookupTable::build` already
/// enforces these at construction time (it is the only way to obtain one),
/// so this re-validates defensively in case a caller hands in a table
/// built elsewhere.
fn check_lookup_table_invariants(table: &CodeLookupTable, result: &mut ValidationResult) {
    if table.id.trim().is_empty() {
        result.error("<lookup>", "lookup table id must not be empty");
    }
    if table.mappings.is_empty() {
        result.error(table.id.as_str(), "lookup table has no mappings");
    }
}

fn check_resource_mapping(
    mapping: &ResourceMapping,
    lookup_tables: &HashMap<String, CodeLookupTable>,
    catalogue: &dyn FhirStructureCatalogue,
    result: &mut ValidationResult,
) {
    let mapping_field = mapping.id.as_str();

    // Check 2: required shape + FHIR-side catalogue resolution.
    if mapping.id.trim().is_empty() {
        result.error("<mapping>", "resource mapping id must not be empty");
    }
    if mapping.source_type.trim().is_empty() || mapping.target_type.trim().is_empty() {
        result.error(mapping_field, "resource mapping must set both sourceType and targetType");
    }
    if !catalogue.resource(mapping.fhir_side()) {
        result.error(
            mapping_field,
            format!("FHIR side '{}' is not a known resource type", mapping.fhir_side()),
        );
    }

    let mut seen_ids = std::collections::HashSet::with_capacity(mapping.field_mappings.len());

    for field in &mapping.field_mappings {
        let field_key = format!("{}.{}", mapping.id, field.id);

        // Check 3: field id uniqueness + required/default rule.
        if !seen_ids.insert(field.id.clone()) {
            result.error(&field_key, "duplicate field id within this mapping");
        }
        if field.target_path.trim().is_empty() {
            result.error(&field_key, "targetPath must not be empty");
        }
        if field.required && field.source_path.is_none() && field.default_value.is_none() {
            result.error(&field_key, "required field has neither sourcePath nor defaultValue");
        }

        // Check 4: dataType whitelist.
        if let Some(dt) = &field.data_type {
            if !crate::mapping::PRIMITIVE_WHITELIST.contains(&dt.as_str()) {
                result.error(&field_key, format!("dataType '{}' is not in the primitive whitelist", dt));
            }
        }

        // Check 5: first-segment path existence on the FHIR side.
        let fhir_path = match mapping.direction {
            Direction::JsonToFhir => Some(field.target_path.as_str()),
            Direction::FhirToJson => field.source_path.as_deref(),
        };
        if let Some(path) = fhir_path {
            let first_segment = path.split('.').next().unwrap_or(path);
            let first_key = first_segment.split('[').next().unwrap_or(first_segment);
            if !catalogue.child_type_name(mapping.fhir_side(), first_key) {
                result.warn(
                    &field_key,
                    format!("'{}' is not a known first-level element of {}", first_key, mapping.fhir_side()),
                );
            }
        }

        // Check 6: dataType compatibility (best-effort; only fires when we
        // can name the FHIR element's declared type, which this catalogue
        // does not track — so this remains a warning hook for richer
        // catalogues rather than a hard error here).
        if let Some(dt) = &field.data_type {
            if compatible_fhir_types(dt).is_none() {
                result.warn(&field_key, format!("dataType '{}' has no declared FHIR compatibility set", dt));
            }
        }

        // Check 7: expression parsability + condition heuristic.
        if let Some(cond) = &field.condition {
            check_expression(cond, &field_key, "condition", result);
            if !looks_like_a_test(cond) {
                result.warn(&field_key, "condition has no visible comparison/logical operator");
            }
        }
        if let Some(expr) = &field.transform_expression {
            check_expression(expr, &field_key, "transformExpression", result);
        }

        // Check 8: validator expression well-formedness.
        if let Some(validator_expr) = &field.validator {
            check_validator_literal(validator_expr, &field_key, result);
        }

        // Check 9: lookupTable reference resolution, plus the reverse-lookup
        // precondition: a field read in the `lookupSource` direction (either
        // because the owning mapping is `FhirToJson`, or because
        // `lookupSourceField` forces it) needs a bidirectional table or the
        // interpreter will fail every such field at transform time.
        if let Some(table_id) = &field.lookup_table {
            match lookup_tables.get(table_id) {
                None => {
                    result.error(&field_key, format!("lookupTable '{}' does not exist in the registry", table_id));
                }
                Some(table) => {
                    let reverse = mapping.direction == Direction::FhirToJson || field.lookup_source_field.is_some();
                    if reverse && !table.bidirectional {
                        result.error(
                            &field_key,
                            format!(
                                "lookupTable '{}' is read in reverse for this field but is not bidirectional",
                                table_id
                            ),
                        );
                    }
                }
            }
        }
    }
}

fn check_expression(source: &str, field_key: &str, which: &str, result: &mut ValidationResult) {
    let dummy_ctx = crate::mapping::TransformationContext::new();
    let substituted = context::substitute_for_expression(source, &dummy_ctx);
    if let Err(err) = parse_expr(&substituted) {
        result.error(field_key, format!("{} does not parse: {}", which, err));
    }
}

fn looks_like_a_test(condition: &str) -> bool {
    const OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "<", ">", "&&", "||", "!"];
    OPERATORS.iter().any(|op| condition.contains(op))
}

fn check_validator_literal(literal: &str, field_key: &str, result: &mut ValidationResult) {
    let trimmed = literal.trim();
    if trimmed == "notEmpty()" {
        return;
    }
    if let Some(pattern) = trimmed.strip_prefix("regex(").and_then(|s| s.strip_suffix(')')) {
        let pattern = pattern.trim().trim_matches(|c| c == '\'' || c == '"');
        if regex::Regex::new(pattern).is_err() {
            result.error(field_key, format!("validator regex pattern does not compile: '{}'", pattern));
        }
        return;
    }
    if let Some(args) = trimmed.strip_prefix("range(").and_then(|s| s.strip_suffix(')')) {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        let parses = parts.len() == 2 && parts.iter().all(|p| p.parse::<f64>().is_ok());
        if !parses {
            result.error(field_key, format!("validator range(...) arguments are not two numbers: '{}'", args));
        }
        return;
    }
    result.warn(field_key, format!("validator '{}' is not one of notEmpty()/regex()/range()", literal));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::CodeMapping;
    use crate::mapping::{Direction, FieldMapping};
    use catalogue::StaticStructureCatalogue;

    fn field(id: &str) -> FieldMapping {
        FieldMapping {
            id: id.into(),
            source_path: Some("patientId".into()),
            target_path: "identifier[0].value".into(),
            data_type: Some("string".into()),
            transform_expression: None,
            condition: None,
            validator: None,
            required: true,
            default_value: None,
            lookup_table: None,
            lookup_source_field: None,
            description: None,
        }
    }

    fn mapping(fields: Vec<FieldMapping>) -> ResourceMapping {
        ResourceMapping {
            id: "m1".into(),
            name: "Patient mapping".into(),
            source_type: "PatientRecord".into(),
            target_type: "Patient".into(),
            version: "1".into(),
            direction: Direction::JsonToFhir,
            field_mappings: fields,
        }
    }

    #[test]
    fn clean_mapping_has_no_errors() {
        let catalogue = StaticStructureCatalogue::default();
        let result = validate(&[mapping(vec![field("f1")])], &HashMap::new(), &catalogue);
        assert!(result.is_ok());
    }

    #[test]
    fn unknown_fhir_resource_is_an_error() {
        let mut m = mapping(vec![field("f1")]);
        m.target_type = "NotAResource".into();
        let catalogue = StaticStructureCatalogue::default();
        let result = validate(&[m], &HashMap::new(), &catalogue);
        assert!(!result.is_ok());
    }

    #[test]
    fn unknown_first_segment_is_a_warning_not_an_error() {
        let mut f = field("f1");
        f.target_path = "notAField[0].value".into();
        let catalogue = StaticStructureCatalogue::default();
        let result = validate(&[mapping(vec![f])], &HashMap::new(), &catalogue);
        assert!(result.is_ok());
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn unparsable_transform_expression_is_an_error() {
        let mut f = field("f1");
        f.transform_expression = Some("fn.uppercase(".into());
        let catalogue = StaticStructureCatalogue::default();
        let result = validate(&[mapping(vec![f])], &HashMap::new(), &catalogue);
        assert!(!result.is_ok());
    }

    #[test]
    fn condition_without_operator_warns() {
        let mut f = field("f1");
        f.condition = Some("ssn".into());
        let catalogue = StaticStructureCatalogue::default();
        let result = validate(&[mapping(vec![f])], &HashMap::new(), &catalogue);
        assert!(result.warnings.iter().any(|w| w.message.contains("comparison")));
    }

    #[test]
    fn validator_literals_are_checked() {
        let catalogue = StaticStructureCatalogue::default();

        let mut ok_regex = field("f1");
        ok_regex.validator = Some("regex('^[0-9]+$')".into());
        assert!(validate(&[mapping(vec![ok_regex])], &HashMap::new(), &catalogue).is_ok());

        let mut bad_regex = field("f2");
        bad_regex.validator = Some("regex('[')".into());
        assert!(!validate(&[mapping(vec![bad_regex])], &HashMap::new(), &catalogue).is_ok());

        let mut ok_range = field("f3");
        ok_range.validator = Some("range(0, 120)".into());
        assert!(validate(&[mapping(vec![ok_range])], &HashMap::new(), &catalogue).is_ok());

        let mut unknown = field("f4");
        unknown.validator = Some("mystery()".into());
        let result = validate(&[mapping(vec![unknown])], &HashMap::new(), &catalogue);
        assert!(result.is_ok());
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn missing_lookup_table_reference_is_an_error() {
        let mut f = field("f1");
        f.lookup_table = Some("gender".into());
        let catalogue = StaticStructureCatalogue::default();
        let result = validate(&[mapping(vec![f])], &HashMap::new(), &catalogue);
        assert!(!result.is_ok());
    }

    #[test]
    fn reverse_lookup_against_non_bidirectional_table_is_an_error() {
        let mut f = field("f1");
        f.lookup_table = Some("gender".into());
        let mut m = mapping(vec![f]);
        m.direction = Direction::FhirToJson;
        let table = CodeLookupTable::new(
            "gender",
            "Gender",
            "internal",
            "http://hl7.org/fhir/administrative-gender",
            false,
            None,
            None,
            vec![CodeMapping { source_code: "M".into(), target_code: "male".into(), display: None }],
        )
        .build()
        .unwrap();
        let mut tables = HashMap::new();
        tables.insert("gender".to_string(), table);
        let catalogue = StaticStructureCatalogue::default();
        let result = validate(&[m], &tables, &catalogue);
        assert!(!result.is_ok());
    }

    #[test]
    fn existing_lookup_table_reference_resolves() {
        let mut f = field("f1");
        f.lookup_table = Some("gender".into());
        let table = CodeLookupTable::new(
            "gender",
            "Gender",
            "internal",
            "http://hl7.org/fhir/administrative-gender",
            false,
            None,
            None,
            vec![CodeMapping { source_code: "M".into(), target_code: "male".into(), display: None }],
        )
        .build()
        .unwrap();
        let mut tables = HashMap::new();
        tables.insert("gender".to_string(), table);
        let catalogue = StaticStructureCatalogue::default();
        let result = validate(&[mapping(vec![f])], &tables, &catalogue);
        assert!(result.is_ok());
    }
}
