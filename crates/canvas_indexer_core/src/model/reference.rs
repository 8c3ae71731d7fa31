//! JSON-LD reference helpers.

use serde_json::Value;

/// Resolves a value that is either a URI string or an object carrying
/// `id` / `@id` (`id` wins when both are present).
///
/// Returns `None` for absent, empty or non-reference values.
pub fn reference_uri(value: &Value) -> Option<&str> {
    let uri = match value {
        Value::String(uri) => uri.as_str(),
        Value::Object(map) => map
            .get("id")
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .or_else(|| map.get("@id").and_then(Value::as_str))?,
        _ => return None,
    };
    let uri = uri.trim();
    if uri.is_empty() {
        None
    } else {
        Some(uri)
    }
}

/// Declared JSON-LD type of an object (`@type`, falling back to `type`).
pub fn declared_type(value: &Value) -> Option<&str> {
    value
        .get("@type")
        .and_then(Value::as_str)
        .or_else(|| value.get("type").and_then(Value::as_str))
}
