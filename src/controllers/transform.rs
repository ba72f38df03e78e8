//! `GET /registry`, `POST /transform`, `POST /reload` (§4.9), grounded on
//! the teacher's `application/usecases/*.rs` (pure logic) feeding
//! thin `controllers/*.rs` HTTP adapters around it.

use crate::application::AppState;
use crate::interpreter;
use crate::mapping::{Direction, TransformationContext};
use crate::tree::TreeValue;
use crate::utils::error::EngineError;
use crate::utils::ApiResponse;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Serialize)]
pub struct RegistryMappingSummary {
    pub id: String,
    pub source_type: String,
    pub target_type: String,
    pub direction: Direction,
}

#[derive(Serialize)]
pub struct RegistrySummary {
    pub fhir_version: String,
    pub mappings: Vec<RegistryMappingSummary>,
    pub lookup_table_ids: Vec<String>,
}

pub async fn list_registry(State(state): State<AppState>) -> Json<ApiResponse<RegistrySummary>> {
    let registry = state.current_registry();
    let mappings = registry
        .resource_mappings
        .iter()
        .map(|m| RegistryMappingSummary {
            id: m.id.clone(),
            source_type: m.source_type.clone(),
            target_type: m.target_type.clone(),
            direction: m.direction,
        })
        .collect();
    let lookup_table_ids = registry.lookup_tables.keys().cloned().collect();
    let summary = RegistrySummary { fhir_version: registry.fhir_version.clone(), mappings, lookup_table_ids };
    Json(ApiResponse::success("registry loaded", summary))
}

#[derive(Deserialize)]
pub struct TransformRequest {
    pub mapping_id: String,
    pub input: Value,
    #[serde(default)]
    pub context: RequestContext,
}

#[derive(Deserialize, Default)]
pub struct RequestContext {
    pub organization_id: Option<String>,
    pub facility_id: Option<String>,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

impl From<RequestContext> for TransformationContext {
    fn from(req: RequestContext) -> Self {
        TransformationContext {
            organization_id: req.organization_id,
            facility_id: req.facility_id,
            tenant_id: req.tenant_id,
            variables: req.variables,
            settings: req.settings,
        }
    }
}

pub async fn transform(
    State(state): State<AppState>,
    Json(request): Json<TransformRequest>,
) -> Result<Json<ApiResponse<Value>>, EngineError> {
    tracing::info!(mapping_id = %request.mapping_id, "handling transform request");

    let registry = state.current_registry();
    let mapping = registry.find_by_id(&request.mapping_id).ok_or_else(|| {
        tracing::warn!(mapping_id = %request.mapping_id, "mapping not found");
        EngineError::Config(format!("mapping '{}' not found", request.mapping_id))
    })?;
    let context = request.context.into();
    let source = TreeValue::from_json(request.input);
    let output = interpreter::transform(mapping, &source, &context, &registry.lookup_tables).map_err(|err| {
        tracing::warn!(mapping_id = %request.mapping_id, error = %err, "transform request failed");
        err
    })?;
    Ok(Json(ApiResponse::success("transformed", output.to_json())))
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub errors: usize,
    pub warnings: usize,
}

/// Re-runs the loader's filesystem reads on a blocking thread (§5) so a slow
/// disk never stalls the async executor.
pub async fn reload(State(state): State<AppState>) -> Result<Json<ApiResponse<ReloadResponse>>, EngineError> {
    tracing::info!("handling registry reload request");
    let validation = tokio::task::spawn_blocking(move || state.reload())
        .await
        .map_err(|e| EngineError::Config(format!("reload task panicked: {}", e)))??;
    tracing::info!(
        errors = validation.errors.len(),
        warnings = validation.warnings.len(),
        "registry reloaded"
    );
    let data = ReloadResponse { errors: validation.errors.len(), warnings: validation.warnings.len() };
    Ok(Json(ApiResponse::success("registry reloaded", data)))
}
