//! Route wiring, grounded on the teacher's `controllers::create_routes`.

use crate::application::AppState;
use crate::controllers::{health, transform};
use axum::routing::{get, post};
use axum::Router;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::check_health))
        .route("/registry", get(transform::list_registry))
        .route("/transform", post(transform::transform))
        .route("/reload", post(transform::reload))
        .with_state(state)
}
