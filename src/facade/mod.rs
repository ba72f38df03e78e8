//! The facade (§4.7): adapts every `(input kind × output kind)` combination
//! around the single interpreter, and the `FhirBridge` trait used to parse
//! and encode canonical FHIR JSON. Grounded on the teacher's use-case/
//! controller split (`application/usecases/*.rs` holding pure logic,
//! `controllers/*.rs` adapting HTTP): this module plays the use-case role,
//! `controllers` plays the controller role.

use crate::mapping::{Direction, MappingRegistry, TransformationContext};
use crate::tree::TreeValue;
use crate::utils::error::{EngineError, EngineResult};
use crate::{interpreter, validator::catalogue::FhirStructureCatalogue};
use serde_json::Value;

/// The required external interface to a FHIR library (§6): parsing and
/// encoding canonical resource JSON, and resolving structure definitions.
/// A production deployment substitutes its own implementation backed by a
/// real FHIR library; [`crate::validator::catalogue::StaticStructureCatalogue`]
/// is the in-process default.
pub trait FhirBridge: Send + Sync {
    /// Parse `raw` (canonical FHIR JSON) as `type_name`, returning a
    /// normalised [`TreeValue`]. The default implementation performs no
    /// structural validation beyond well-formed JSON — it defers resource
    /// shape checking to the catalogue used by the validator.
    fn parse_resource(&self, raw: &str, type_name: &str) -> EngineResult<TreeValue>;

    /// Encode a transformed [`TreeValue`] back into canonical FHIR JSON text.
    fn encode_resource(&self, resource: &TreeValue) -> EngineResult<String>;

    fn structure_catalogue(&self) -> &dyn FhirStructureCatalogue;
}

/// The in-process default: canonical JSON is already the tree shape, so
/// parsing/encoding is the identity transformation modulo `resourceType`
/// bookkeeping, and structure resolution is delegated to a
/// [`FhirStructureCatalogue`].
pub struct JsonFhirBridge<C: FhirStructureCatalogue> {
    catalogue: C,
}

impl<C: FhirStructureCatalogue> JsonFhirBridge<C> {
    pub fn new(catalogue: C) -> Self {
        Self { catalogue }
    }
}

impl<C: FhirStructureCatalogue> FhirBridge for JsonFhirBridge<C> {
    fn parse_resource(&self, raw: &str, type_name: &str) -> EngineResult<TreeValue> {
        let value: Value = serde_json::from_str(raw)?;
        let tree = TreeValue::from_json(value);
        if !self.catalogue.resource(type_name) {
            return Err(EngineError::Config(format!("'{}' is not a known FHIR resource type", type_name)));
        }
        Ok(tree)
    }

    fn encode_resource(&self, resource: &TreeValue) -> EngineResult<String> {
        Ok(serde_json::to_string(&resource.to_json())?)
    }

    fn structure_catalogue(&self) -> &dyn FhirStructureCatalogue {
        &self.catalogue
    }
}

fn guard_direction(mapping_id: &str, actual: Direction, expected: Direction) -> EngineResult<()> {
    if actual != expected {
        return Err(EngineError::DirectionMismatch {
            mapping_id: mapping_id.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Transform a JSON document into a FHIR resource tree, by mapping id.
pub fn json_to_fhir_tree(
    registry: &MappingRegistry,
    mapping_id: &str,
    input: &Value,
    context: &TransformationContext,
) -> EngineResult<TreeValue> {
    let mapping = registry
        .find_by_id(mapping_id)
        .ok_or_else(|| EngineError::Config(format!("mapping '{}' not found", mapping_id)))?;
    guard_direction(mapping_id, mapping.direction, Direction::JsonToFhir)?;
    let source = TreeValue::from_json(input.clone());
    interpreter::transform(mapping, &source, context, &registry.lookup_tables)
}

/// Transform a JSON document into canonical FHIR JSON text via `bridge`.
pub fn json_to_fhir_string(
    registry: &MappingRegistry,
    mapping_id: &str,
    input: &Value,
    context: &TransformationContext,
    bridge: &dyn FhirBridge,
) -> EngineResult<String> {
    let tree = json_to_fhir_tree(registry, mapping_id, input, context)?;
    bridge.encode_resource(&tree)
}

/// Transform a canonical FHIR JSON string into a plain JSON document, by
/// mapping id. `type_name` is the FHIR resource type the mapping's
/// `sourceType` must name; used only to ask the bridge to parse/validate.
pub fn fhir_to_json(
    registry: &MappingRegistry,
    mapping_id: &str,
    raw_fhir: &str,
    context: &TransformationContext,
    bridge: &dyn FhirBridge,
) -> EngineResult<Value> {
    let mapping = registry
        .find_by_id(mapping_id)
        .ok_or_else(|| EngineError::Config(format!("mapping '{}' not found", mapping_id)))?;
    guard_direction(mapping_id, mapping.direction, Direction::FhirToJson)?;
    let source = bridge.parse_resource(raw_fhir, mapping.fhir_side())?;
    let target = interpreter::transform(mapping, &source, context, &registry.lookup_tables)?;
    Ok(target.to_json())
}

/// Transform an already-parsed FHIR resource tree into a plain JSON document.
pub fn fhir_tree_to_json(
    registry: &MappingRegistry,
    mapping_id: &str,
    source: &TreeValue,
    context: &TransformationContext,
) -> EngineResult<Value> {
    let mapping = registry
        .find_by_id(mapping_id)
        .ok_or_else(|| EngineError::Config(format!("mapping '{}' not found", mapping_id)))?;
    guard_direction(mapping_id, mapping.direction, Direction::FhirToJson)?;
    let target = interpreter::transform(mapping, source, context, &registry.lookup_tables)?;
    Ok(target.to_json())
}

/// Transform by `(sourceType, direction)` lookup instead of an explicit
/// mapping id — the routing a caller would use when it only knows the
/// shape of the document it has, not which mapping handles it.
pub fn transform_by_source_type(
    registry: &MappingRegistry,
    source_type: &str,
    direction: Direction,
    input: &Value,
    context: &TransformationContext,
) -> EngineResult<Value> {
    let mapping = registry
        .find_by_source_and_direction(source_type, direction)
        .ok_or_else(|| EngineError::MappingNotFound { source_type: source_type.to_string(), direction })?;
    let source = TreeValue::from_json(input.clone());
    let target = interpreter::transform(mapping, &source, context, &registry.lookup_tables)?;
    Ok(target.to_json())
}
