//! Incremental delimiter-bounded token extraction.
//!
//! Text records arrive over a file or a pipe in arbitrary chunks. The
//! [`TokenScanner`] accumulates bytes and cuts complete `(begin, end)`
//! delimited tokens out of them without rescanning what it already saw;
//! the [`TokenReader`] polls a source, feeds the scanner and hands every
//! completed token to a callback.

pub mod error;
pub mod reader;
pub mod scanner;
pub mod source;

pub use error::{CallbackAbort, Result, TokenError};
pub use reader::{
    ReaderConfig, ReaderExit, TokenReader, DEFAULT_CHUNK_SIZE, DEFAULT_POLL_INTERVAL,
    END_OF_TRANSMISSION,
};
pub use scanner::TokenScanner;
#[cfg(unix)]
pub use source::{set_nonblocking, NonBlockingGuard};
pub use source::SourceKind;
