use notifier_models::core::Notification;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed notification payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("notification payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Parse a raw broker payload. Only structural problems are reported here; required fields
/// and defaults are dealt with when the notification is persisted.
pub fn decode(payload: &[u8]) -> Result<Notification, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject(json_kind(&value)));
    }
    Ok(serde_json::from_value(value)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
