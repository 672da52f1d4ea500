use framelink_token::TokenError;
use framelink_transport::TransportError;

/// Errors that stop a chunker.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("input I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record delimiter error: {0}")]
    Token(#[from] TokenError),

    #[error("transport rejected unit: {0}")]
    Transport(#[from] TransportError),
}

/// Reasons a message record is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record is missing a schema id")]
    MissingSchemaId,

    #[error("invalid schema id {0:?}")]
    InvalidSchemaId(String),

    #[error("record for schema {0} has no payload")]
    MissingPayload(u16),
}

pub type Result<T> = std::result::Result<T, ChunkError>;
