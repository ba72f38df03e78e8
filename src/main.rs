use fhir_mapping_engine::application::AppState;
use fhir_mapping_engine::controllers;
use fhir_mapping_engine::registry::loader;
use fhir_mapping_engine::settings::AppConfig;

use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fhir_mapping_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let mappings_dir = config.mappings_dir.clone();
    let fhir_version = config.fhir_version.clone();
    let strict = config.strict_validation;
    let outcome =
        tokio::task::spawn_blocking(move || loader::load_from_disk(&mappings_dir, &fhir_version, strict))
            .await??;

    let bind_addr = config.http_bind_addr;
    let state = AppState::new(config, outcome.registry);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT]);

    let app = controllers::create_routes(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    tracing::info!("fhir-mapping-engine listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
