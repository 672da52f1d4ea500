use std::fmt;
use std::io;

use framelink_chunk::ChunkError;
use framelink_decode::{ThresholdError, TrackerError};
use framelink_schema::SchemaError;
use framelink_token::TokenError;
use framelink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn token_error(context: &str, err: TokenError) -> CliError {
    match err {
        TokenError::Io(source) => io_error(context, source),
        TokenError::EmptyDelimiter => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn chunk_error(context: &str, err: ChunkError) -> CliError {
    match err {
        ChunkError::Io(source) => io_error(context, source),
        ChunkError::Token(err) => token_error(context, err),
        ChunkError::Transport(err) => transport_error(context, err),
    }
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::LoadFailed(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn threshold_error(context: &str, err: ThresholdError) -> CliError {
    CliError::new(USAGE, format!("{context}: {err}"))
}

pub fn tracker_error(context: &str, err: TrackerError) -> CliError {
    CliError::new(USAGE, format!("{context}: {err}"))
}
