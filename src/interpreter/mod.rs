//! The transformation interpreter (§4.6): walks a [`ResourceMapping`]'s
//! field mappings in declared order and builds the target tree one field at
//! a time. Grounded on the teacher's
//! `FhirGenerator::generate_resource_with_transformations` loop (read
//! origin value → apply transformation lookup → apply reference/display
//! companion write → write via `set_nested_value`), generalised from its
//! Mongo-entity-specific version into the declarative, registry-driven
//! version described here.

use crate::expr::{self, context, Bindings};
use crate::lookup::CodeLookupTable;
use crate::mapping::{Direction, FieldMapping, ResourceMapping, TransformationContext};
use crate::path;
use crate::tree::TreeValue;
use crate::utils::error::{EngineError, EngineResult};
use std::collections::HashMap;

pub fn transform(
    mapping: &ResourceMapping,
    source: &TreeValue,
    context: &TransformationContext,
    lookup_tables: &HashMap<String, CodeLookupTable>,
) -> EngineResult<TreeValue> {
    tracing::debug!(mapping_id = %mapping.id, direction = ?mapping.direction, fields = mapping.field_mappings.len(), "starting transformation");

    let mut target = TreeValue::empty_map();

    if mapping.direction == Direction::JsonToFhir {
        path::set(&mut target, "resourceType", TreeValue::from(mapping.target_type.as_str()))?;
    }

    for field in &mapping.field_mappings {
        match apply_field(field, mapping.direction, source, context, lookup_tables, &target) {
            Ok(Some(value)) => path::set(&mut target, &field.target_path, value)?,
            Ok(None) => {}
            Err(err) => {
                if field.required {
                    tracing::warn!(mapping_id = %mapping.id, field_id = %field.id, error = %err, "required field failed, aborting transformation");
                    return Err(EngineError::Field { field_id: field.id.clone(), source: Box::new(err) });
                }
                tracing::debug!(mapping_id = %mapping.id, field_id = %field.id, error = %err, "optional field failed, omitting from output");
            }
        }
    }

    tracing::debug!(mapping_id = %mapping.id, "transformation complete");
    Ok(target)
}

/// Steps 1-8 of §4.6 for a single field. `Ok(None)` means "skip" (steps 1
/// or 5); `Ok(Some(value))` is the value ready for step 9's write.
fn apply_field(
    field: &FieldMapping,
    direction: Direction,
    source: &TreeValue,
    context: &TransformationContext,
    lookup_tables: &HashMap<String, CodeLookupTable>,
    target_in_progress: &TreeValue,
) -> EngineResult<Option<TreeValue>> {
    // Step 1: condition.
    if let Some(condition) = &field.condition {
        let substituted = context::substitute_for_expression(condition, context);
        let parsed = expr::parse_cached(&substituted, 0)?;
        if !expr::eval_condition(&parsed, source)? {
            return Ok(None);
        }
    }

    // Step 2: read.
    let mut value = field
        .source_path
        .as_deref()
        .and_then(|p| path::get(source, p))
        .cloned();

    // Step 3: default.
    if value.as_ref().map(|v| v.is_null()).unwrap_or(true) {
        if let Some(default) = &field.default_value {
            value = Some(resolve_default(default, context));
        }
    }

    // Step 4 & 5: required check / skip.
    let mut value = match value {
        Some(v) => v,
        None => {
            if field.required {
                return Err(EngineError::RequiredFieldMissing { field_id: field.id.clone() });
            }
            return Ok(None);
        }
    };

    // Step 6: lookup. A `FhirToJson` mapping reads codes from the table's
    // target side and must resolve them back through `lookupSource`, or the
    // bidirectional round-trip invariant (`lookupSource(lookupTarget(c)) =
    // c`) never actually gets exercised in the direction it promises.
    // `lookupSourceField` lets one field force the reverse lookup even
    // inside an otherwise `JsonToFhir` mapping.
    if let Some(table_id) = &field.lookup_table {
        let table = lookup_tables
            .get(table_id)
            .ok_or_else(|| EngineError::Config(format!("lookupTable '{}' does not exist", table_id)))?;
        let code = value.stringify();
        let reverse = direction == Direction::FhirToJson || field.lookup_source_field.is_some();
        let resolved = if reverse {
            table.lookup_source(&code)?.ok_or_else(|| EngineError::LookupMiss {
                table_id: table_id.clone(),
                code,
                field_id: field.id.clone(),
            })?
        } else {
            table.lookup_target(&code).ok_or_else(|| EngineError::LookupMiss {
                table_id: table_id.clone(),
                code,
                field_id: field.id.clone(),
            })?
        };
        tracing::debug!(field_id = %field.id, table_id = %table_id, reverse, "resolved code lookup");
        value = TreeValue::String(resolved);
    }

    // Step 7: transform.
    if let Some(expr_source) = &field.transform_expression {
        let substituted = context::substitute_for_expression(expr_source, context);
        let parsed = expr::parse_cached(&substituted, 0)?;
        let bindings = Bindings { document: source, value: Some(&value) };
        value = expr::eval(&parsed, &bindings)?;
    }

    // Step 8: validate.
    if let Some(validator_expr) = &field.validator {
        run_validator(validator_expr, &value, &field.id)?;
    }

    let _ = target_in_progress; // reserved for a future cross-field validator surface.
    Ok(Some(value))
}

/// `defaultValue` may be a bare `$ctx.*` reference (resolved to its native
/// JSON type) or a JSON literal embedding `$ctx.*` tokens as a template.
fn resolve_default(default: &serde_json::Value, context: &TransformationContext) -> TreeValue {
    if let serde_json::Value::String(s) = default {
        if let Some(resolved) = context::resolve_whole_token(s, context) {
            return TreeValue::from_json(resolved);
        }
        return TreeValue::String(context::substitute_for_template(s, context));
    }
    TreeValue::from_json(default.clone())
}

fn run_validator(literal: &str, value: &TreeValue, field_id: &str) -> EngineResult<()> {
    let trimmed = literal.trim();

    if trimmed == "notEmpty()" {
        if !value.truthy() {
            return Err(EngineError::ValidationFailure {
                field_id: field_id.to_string(),
                rule: trimmed.to_string(),
                message: "value is empty".into(),
            });
        }
        return Ok(());
    }

    if let Some(pattern) = trimmed.strip_prefix("regex(").and_then(|s| s.strip_suffix(')')) {
        let pattern = pattern.trim().trim_matches(|c| c == '\'' || c == '"');
        let re = regex::Regex::new(pattern).map_err(|e| EngineError::ValidationFailure {
            field_id: field_id.to_string(),
            rule: trimmed.to_string(),
            message: format!("invalid pattern: {}", e),
        })?;
        let text = value.stringify();
        if !re.is_match(&text) {
            return Err(EngineError::ValidationFailure {
                field_id: field_id.to_string(),
                rule: trimmed.to_string(),
                message: format!("'{}' does not match {}", text, pattern),
            });
        }
        return Ok(());
    }

    if let Some(args) = trimmed.strip_prefix("range(").and_then(|s| s.strip_suffix(')')) {
        let parts: Vec<f64> = args
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| EngineError::ValidationFailure {
                field_id: field_id.to_string(),
                rule: trimmed.to_string(),
                message: "range(...) arguments must be two numbers".into(),
            })?;
        let (min, max) = match parts.as_slice() {
            [min, max] => (*min, *max),
            _ => {
                return Err(EngineError::ValidationFailure {
                    field_id: field_id.to_string(),
                    rule: trimmed.to_string(),
                    message: "range(...) requires exactly two arguments".into(),
                })
            }
        };
        let n = expr::as_number(value).map_err(|_| EngineError::ValidationFailure {
            field_id: field_id.to_string(),
            rule: trimmed.to_string(),
            message: "value is not a number".into(),
        })?;
        if n < min || n > max {
            return Err(EngineError::ValidationFailure {
                field_id: field_id.to_string(),
                rule: trimmed.to_string(),
                message: format!("{} is outside [{}, {}]", n, min, max),
            });
        }
        return Ok(());
    }

    Err(EngineError::ValidationFailure {
        field_id: field_id.to_string(),
        rule: trimmed.to_string(),
        message: "unrecognised validator literal".into(),
    })
}
