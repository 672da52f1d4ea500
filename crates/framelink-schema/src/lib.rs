//! JSON Schema registry for framelink message records.
//!
//! Every message record carries a numeric schema id. The registry maps ids
//! to compiled JSON Schema 2020-12 validators so the sender can reject
//! records for unknown schemas, or records whose payload does not match,
//! before they are queued for transmission.

pub mod config;
pub mod error;
pub mod registry;
mod validator;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use registry::SchemaRegistry;
