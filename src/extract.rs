//! Error-message extraction from JSON error bodies.
//!
//! APIs disagree on where the human-readable message lives. The extractor
//! probes the known shapes in a fixed priority order and falls back to the
//! bare status code when nothing matches; it never fails on malformed input.

use serde_json::Value;

/// Produces one human-readable message for a failed response.
///
/// Priority order: `error_description`, then `error` (object sub-fields
/// `message`/`code`/`description`, or a plain string), then `message`, then
/// `detail` (string, or first element's `msg` in a validation array), then
/// the first entry of `errors`. Shape mismatches fall through to the next
/// rule.
pub(crate) fn error_message(status_code: u16, body: &[u8]) -> String {
    let base = format!("API Error: {status_code}");

    let Ok(parsed) = serde_json::from_slice::<Value>(body) else {
        return base;
    };
    let Some(fields) = parsed.as_object() else {
        return base;
    };

    // OAuth/OIDC convention.
    if let Some(text) = fields.get("error_description").and_then(Value::as_str) {
        return format!("API Error: {text}");
    }

    if let Some(error) = fields.get("error") {
        if let Some(nested) = error.as_object() {
            for key in ["message", "code", "description"] {
                if let Some(value) = nested.get(key) {
                    return format!("API Error: {}", value_text(value));
                }
            }
        } else if let Some(text) = error.as_str() {
            return format!("API Error: {text}");
        }
    }

    if let Some(text) = fields.get("message").and_then(Value::as_str) {
        return format!("API Error: {text}");
    }

    if let Some(detail) = fields.get("detail") {
        if let Some(text) = detail.as_str() {
            return format!("API Error: {text}");
        }
        // FastAPI-style validation arrays: [{"msg": "...", "loc": [...]}].
        if let Some(value) = detail
            .as_array()
            .and_then(|items| items.first())
            .and_then(|first| first.get("msg"))
        {
            return format!("API Error: {}", value_text(value));
        }
    }

    if let Some(first) = fields
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
    {
        if first.is_object() {
            for key in ["message", "msg", "detail", "description"] {
                if let Some(value) = first.get(key) {
                    return format!("API Error: {}", value_text(value));
                }
            }
        } else if let Some(text) = first.as_str() {
            return format!("API Error: {text}");
        }
    }

    base
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
