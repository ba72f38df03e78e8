//! `GET /health`, mirroring the teacher's `health::check_health`.

use crate::application::AppState;
use crate::utils::ApiResponse;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub fhir_version: String,
    pub registry_loaded_at: chrono::DateTime<chrono::Utc>,
    pub resource_mapping_count: usize,
    pub lookup_table_count: usize,
}

pub async fn check_health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let registry = state.current_registry();
    let data = HealthResponse {
        status: "ok",
        fhir_version: registry.fhir_version.clone(),
        registry_loaded_at: registry.loaded_at,
        resource_mapping_count: registry.resource_mappings.len(),
        lookup_table_count: registry.lookup_tables.len(),
    };
    Json(ApiResponse::success("healthy", data))
}
