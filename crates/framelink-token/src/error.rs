/// Errors that can occur while reading tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The end delimiter must contain at least one byte.
    #[error("end delimiter must not be empty")]
    EmptyDelimiter,

    /// An I/O error occurred while reading the source.
    #[error("token source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Returned by a token callback to abort the reader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token callback aborted: {reason}")]
pub struct CallbackAbort {
    pub reason: String,
}

impl CallbackAbort {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TokenError>;
