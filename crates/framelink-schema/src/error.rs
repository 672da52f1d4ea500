/// Errors raised while loading schemas or validating message payloads.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    #[error("failed to compile schema {schema_id}: {message}")]
    CompileFailed { schema_id: u16, message: String },

    #[error("payload does not match schema {schema_id}: {message}")]
    ValidationFailed { schema_id: u16, message: String },

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unknown schema id {0}")]
    UnknownSchema(u16),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
