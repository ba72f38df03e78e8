//! Process configuration, read from the environment the way the teacher's
//! `Config::from_env` does (`dotenvy` + `std::env`), generalised from the
//! teacher's Mongo/JWT fields to the mapping engine's own knobs.

use crate::utils::error::EngineError;
use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mappings_dir: PathBuf,
    pub strict_validation: bool,
    pub http_bind_addr: SocketAddr,
    pub fhir_version: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, EngineError> {
        dotenv().ok();

        let mappings_dir = env::var("MAPPINGS_DIR")
            .unwrap_or_else(|_| "mappings".to_string())
            .into();

        let strict_validation = env::var("STRICT_VALIDATION")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .map_err(|_| EngineError::Config("STRICT_VALIDATION must be true or false".into()))?;

        let http_bind_addr = env::var("HTTP_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|_| EngineError::Config("invalid HTTP_BIND_ADDR".into()))?;

        let fhir_version = env::var("FHIR_VERSION").unwrap_or_else(|_| "4.0.1".to_string());

        Ok(AppConfig { mappings_dir, strict_validation, http_bind_addr, fhir_version })
    }
}
