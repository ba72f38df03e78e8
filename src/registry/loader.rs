//! Filesystem loader (§4.8): reads `<base>/lookups/*.json` and
//! `<base>/resources/*.json`, one level deep, deserialising each file with
//! `serde_json` the way the teacher's entities derive `Serialize`/
//! `Deserialize`, then runs §4.5's validator before admitting the result
//! into a [`MappingRegistry`].

use crate::lookup::CodeLookupTable;
use crate::mapping::{MappingRegistry, ResourceMapping};
use crate::utils::error::{EngineError, EngineResult};
use crate::validator::catalogue::StaticStructureCatalogue;
use crate::validator::{self, ValidationResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub struct LoadOutcome {
    pub registry: MappingRegistry,
    pub validation: ValidationResult,
}

/// Load a registry from `<base>/lookups/` and `<base>/resources/`.
///
/// A missing `lookups/` directory is treated as "no lookup tables" and
/// skipped silently; a missing `resources/` directory is a fatal
/// `ConfigError` since a registry with no resource mappings cannot serve
/// any transformation. In `strict` mode, any validator error aborts the
/// load; otherwise the registry is still built and the caller inspects
/// `validation.errors` itself.
pub fn load_from_disk(base: &Path, fhir_version: &str, strict: bool) -> EngineResult<LoadOutcome> {
    tracing::info!(base = %base.display(), strict, "loading mapping registry from disk");

    let lookup_tables = load_lookup_tables(&base.join("lookups"))?;
    let resource_mappings = load_resource_mappings(&base.join("resources"))?;

    let catalogue = StaticStructureCatalogue::default();
    let validation = validator::validate(&resource_mappings, &lookup_tables, &catalogue);

    for warning in &validation.warnings {
        tracing::warn!(field = %warning.field, "{}", warning.message);
    }
    for error in &validation.errors {
        tracing::error!(field = %error.field, "{}", error.message);
    }

    if strict && !validation.is_ok() {
        let first = &validation.errors[0];
        tracing::error!(base = %base.display(), "aborting load in strict mode due to validation errors");
        return Err(EngineError::Config(format!("{}: {}", first.field, first.message)));
    }

    let registry = MappingRegistry::new(fhir_version.to_string(), resource_mappings, lookup_tables)?;
    tracing::info!(
        resource_mappings = registry.resource_mappings.len(),
        lookup_tables = registry.lookup_tables.len(),
        "mapping registry loaded"
    );
    Ok(LoadOutcome { registry, validation })
}

fn load_lookup_tables(dir: &Path) -> EngineResult<HashMap<String, CodeLookupTable>> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "lookups directory does not exist, skipping");
        return Ok(HashMap::new());
    }
    let mut tables = HashMap::new();
    for path in json_files_in(dir)? {
        tracing::debug!(path = %path.display(), "loading lookup table");
        let raw = fs::read_to_string(&path)?;
        let table: CodeLookupTable = serde_json::from_str(&raw)?;
        let table = table.build()?;
        tables.insert(table.id.clone(), table);
    }
    Ok(tables)
}

fn load_resource_mappings(dir: &Path) -> EngineResult<Vec<ResourceMapping>> {
    if !dir.is_dir() {
        tracing::error!(dir = %dir.display(), "resources directory does not exist");
        return Err(EngineError::Config(format!(
            "resources directory '{}' does not exist",
            dir.display()
        )));
    }
    let mut mappings = Vec::new();
    for path in json_files_in(dir)? {
        tracing::debug!(path = %path.display(), "loading resource mapping");
        let raw = fs::read_to_string(&path)?;
        let mapping: ResourceMapping = serde_json::from_str(&raw)?;
        mappings.push(mapping);
    }
    Ok(mappings)
}

/// Top-level `*.json` files in `dir`, one level deep — subdirectories are
/// not descended into.
fn json_files_in(dir: &Path) -> EngineResult<Vec<std::path::PathBuf>> {
    let mut files: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile_like_helpers::TempDir;

    mod tempfile_like_helpers {
        use std::path::PathBuf;

        /// A minimal self-cleaning temp directory, since this crate does not
        /// depend on the `tempfile` crate — avoids adding a dependency for a
        /// handful of loader tests.
        pub struct TempDir {
            path: PathBuf,
        }

        impl TempDir {
            pub fn new(label: &str) -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!("fhir-mapping-engine-test-{}-{}", label, std::process::id()));
                std::fs::create_dir_all(&path).unwrap();
                Self { path }
            }

            pub fn path(&self) -> &std::path::Path {
                &self.path
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.path);
            }
        }
    }

    fn write_file(dir: &Path, name: &str, contents: &str) {
        std::fs::create_dir_all(dir).unwrap();
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn sample_resource_mapping_json() -> &'static str {
        r#"{
            "id": "patient-in",
            "name": "Patient mapping",
            "sourceType": "PatientRecord",
            "targetType": "Patient",
            "version": "1",
            "direction": "JSON_TO_FHIR",
            "fieldMappings": [
                {
                    "id": "given",
                    "sourcePath": "firstName",
                    "targetPath": "name[0].given[0]",
                    "required": false
                }
            ]
        }"#
    }

    #[test]
    fn missing_resources_dir_is_fatal() {
        let tmp = TempDir::new("missing-resources");
        let err = load_from_disk(tmp.path(), "4.0.1", true).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn missing_lookups_dir_is_silently_skipped() {
        let tmp = TempDir::new("missing-lookups");
        write_file(&tmp.path().join("resources"), "patient.json", sample_resource_mapping_json());
        let outcome = load_from_disk(tmp.path(), "4.0.1", true).unwrap();
        assert!(outcome.registry.lookup_tables.is_empty());
        assert_eq!(outcome.registry.resource_mappings.len(), 1);
    }

    #[test]
    fn loads_lookup_tables_and_resource_mappings() {
        let tmp = TempDir::new("full-load");
        write_file(&tmp.path().join("resources"), "patient.json", sample_resource_mapping_json());
        write_file(
            &tmp.path().join("lookups"),
            "gender.json",
            r#"{
                "id": "gender",
                "name": "Gender",
                "sourceSystem": "internal",
                "targetSystem": "http://hl7.org/fhir/administrative-gender",
                "bidirectional": true,
                "mappings": [{"sourceCode": "M", "targetCode": "male"}]
            }"#,
        );
        let outcome = load_from_disk(tmp.path(), "4.0.1", true).unwrap();
        assert_eq!(outcome.registry.lookup_tables.len(), 1);
        assert!(outcome.registry.get_lookup_table("gender").is_some());
    }

    #[test]
    fn non_strict_mode_surfaces_errors_without_aborting() {
        let tmp = TempDir::new("non-strict");
        write_file(
            &tmp.path().join("resources"),
            "bad.json",
            r#"{
                "id": "bad",
                "name": "Bad mapping",
                "sourceType": "PatientRecord",
                "targetType": "NotARealResource",
                "direction": "JSON_TO_FHIR",
                "fieldMappings": []
            }"#,
        );
        let outcome = load_from_disk(tmp.path(), "4.0.1", false).unwrap();
        assert!(!outcome.validation.is_ok());
    }
}
