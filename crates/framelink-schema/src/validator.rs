use jsonschema::Validator;

use crate::error::{Result, SchemaError};

/// Maximum number of individual violations folded into one error message.
const MAX_REPORTED_ERRORS: usize = 4;

pub(crate) fn validate_payload(schema_id: u16, payload: &[u8], validator: &Validator) -> Result<()> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;

    let message = validator
        .iter_errors(&value)
        .take(MAX_REPORTED_ERRORS)
        .map(|err| err.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    if message.is_empty() {
        return Ok(());
    }
    Err(SchemaError::ValidationFailed { schema_id, message })
}
