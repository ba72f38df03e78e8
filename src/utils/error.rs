use thiserror::Error;

/// The engine's error taxonomy. Each variant corresponds to one of the tags
/// in the error-handling design: `ConfigError`, `DirectionMismatch`,
/// `RequiredFieldMissing`, `LookupMiss`, `ValidationFailure`,
/// `ExpressionError`, `PathConflict`, `NotBidirectional`.
///
/// Unlike the teacher's `AppError`, this type carries no HTTP dependency —
/// `controllers::error_response` maps it to a status code at the edge, so
/// the interpreter and facade stay embeddable without axum.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("mapping '{mapping_id}' is directed {expected:?} but was invoked as {actual:?}")]
    DirectionMismatch {
        mapping_id: String,
        expected: crate::mapping::Direction,
        actual: crate::mapping::Direction,
    },

    #[error("required field '{field_id}' is missing and has no default")]
    RequiredFieldMissing { field_id: String },

    #[error("lookup miss on table '{table_id}' for code '{code}' (field '{field_id}')")]
    LookupMiss {
        table_id: String,
        code: String,
        field_id: String,
    },

    #[error("validator '{rule}' failed for field '{field_id}': {message}")]
    ValidationFailure {
        field_id: String,
        rule: String,
        message: String,
    },

    #[error("expression error in '{expression}': {message}")]
    Expression { expression: String, message: String },

    #[error("path conflict at '{path}': expected {expected}, found {found}")]
    PathConflict {
        path: String,
        expected: String,
        found: String,
    },

    #[error("lookup table '{table_id}' is not bidirectional")]
    NotBidirectional { table_id: String },

    #[error("field '{field_id}' failed: {source}")]
    Field {
        field_id: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("no mapping found for source type '{source_type}' in direction {direction:?}")]
    MappingNotFound {
        source_type: String,
        direction: crate::mapping::Direction,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Stable tag used by the HTTP facade and by tests that assert on the
    /// taxonomy rather than the formatted message.
    pub fn tag(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "ConfigError",
            EngineError::DirectionMismatch { .. } => "DirectionMismatch",
            EngineError::RequiredFieldMissing { .. } => "RequiredFieldMissing",
            EngineError::LookupMiss { .. } => "LookupMiss",
            EngineError::ValidationFailure { .. } => "ValidationFailure",
            EngineError::Expression { .. } => "ExpressionError",
            EngineError::PathConflict { .. } => "PathConflict",
            EngineError::NotBidirectional { .. } => "NotBidirectional",
            EngineError::Field { .. } => "TransformError",
            EngineError::MappingNotFound { .. } => "MappingNotFound",
            EngineError::Io(_) => "IoError",
            EngineError::Json(_) => "JsonError",
        }
    }
}
