//! Shared application state for the HTTP facade, grounded on the teacher's
//! `application/state.rs` `AppState` (a single `Clone`-able struct holding
//! everything a controller needs), generalised from its Mongo-repository
//! collection down to the registry pointer and config this engine needs.

use crate::facade::{FhirBridge, JsonFhirBridge};
use crate::mapping::MappingRegistry;
use crate::registry::loader;
use crate::settings::AppConfig;
use crate::utils::error::EngineResult;
use crate::validator::catalogue::StaticStructureCatalogue;
use arc_swap::ArcSwap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<ArcSwap<MappingRegistry>>,
    pub bridge: Arc<dyn FhirBridge>,
}

impl AppState {
    pub fn new(config: AppConfig, registry: MappingRegistry) -> Self {
        let bridge = Arc::new(JsonFhirBridge::new(StaticStructureCatalogue::default()));
        Self { config, registry: Arc::new(ArcSwap::from_pointee(registry)), bridge }
    }

    /// Re-run the loader against `config.mappings_dir` and atomically swap
    /// in the new registry (§4.8's hot-reload). Returns the validation
    /// report alongside the swap so the caller can surface warnings.
    pub fn reload(&self) -> EngineResult<crate::validator::ValidationResult> {
        let outcome = loader::load_from_disk(
            &self.config.mappings_dir,
            &self.config.fhir_version,
            self.config.strict_validation,
        )?;
        self.registry.store(Arc::new(outcome.registry));
        Ok(outcome.validation)
    }

    pub fn current_registry(&self) -> Arc<MappingRegistry> {
        self.registry.load_full()
    }
}
