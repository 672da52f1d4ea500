use framelink_schema::SchemaError;

/// Errors raised by the segment transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The unit does not start with the segment magic.
    #[error("invalid segment magic (expected 0x464c \"FL\")")]
    InvalidMagic,

    /// The unit is shorter than its header or declared payload length.
    #[error("truncated segment ({len} bytes, need {need})")]
    Truncated { len: usize, need: usize },

    /// The segment kind byte is not recognized.
    #[error("unknown segment kind {0}")]
    UnknownKind(u8),

    /// A lake segment claims a slot outside its own lake.
    #[error("segment {seq} outside lake of {total}")]
    SequenceOutOfRange { seq: u32, total: u32 },

    /// A lake segment announces more units than the receiver accepts.
    #[error("lake of {total} units exceeds limit of {max}")]
    LakeTooLarge { total: u32, max: usize },

    /// The payload does not fit in one segment.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame length cannot hold a header plus at least one payload byte.
    #[error("frame max length {len} too small (minimum {min})")]
    FrameTooSmall { len: usize, min: usize },

    /// A message references a schema id the registry does not accept.
    #[error("unknown schema id {0}")]
    UnknownSchema(u16),

    /// A message payload failed schema validation.
    #[error("schema validation failed: {0}")]
    Schema(#[source] SchemaError),
}

impl From<SchemaError> for TransportError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownSchema(id) => Self::UnknownSchema(id),
            other => Self::Schema(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
