//! Decoding of the `{success, result, error}` envelope every action returns

use serde_json::Value;

use super::CatalogResponse;
use crate::error::ClientError;

/// Longest slice of a non-JSON body quoted back in a protocol error
const SNIPPET_LEN: usize = 200;

/// Classify a raw response body. Never panics, whatever the input.
///
/// `status` is the HTTP status code; CKAN reports most failures (404, 409)
/// inside a well-formed envelope, so the envelope wins over the status when
/// it can be parsed.
pub fn decode(status: u16, body: &[u8]) -> CatalogResponse {
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            let message = if (200..300).contains(&status) {
                format!("malformed JSON: {}", e)
            } else {
                format!("HTTP {} with non-JSON body: {}", status, snippet(body))
            };
            return CatalogResponse::Failure(ClientError::Protocol(message));
        }
    };

    let mut envelope = match value {
        Value::Object(map) => map,
        other => {
            return CatalogResponse::Failure(ClientError::protocol(format!(
                "HTTP {}: expected an envelope object, got {}",
                status,
                type_name(&other)
            )))
        }
    };

    let success = envelope.get("success").cloned();
    match success {
        Some(Value::Bool(true)) => {
            CatalogResponse::Success(envelope.remove("result").unwrap_or(Value::Null))
        }
        Some(Value::Bool(false)) => {
            CatalogResponse::Failure(remote_error(envelope.get("error")))
        }
        Some(other) => CatalogResponse::Failure(ClientError::protocol(format!(
            "HTTP {}: `success` is {} instead of a boolean",
            status,
            type_name(&other)
        ))),
        None => CatalogResponse::Failure(ClientError::protocol(format!(
            "HTTP {}: envelope has no `success` flag",
            status
        ))),
    }
}

/// Build a `Remote` error from the envelope's `error` member.
///
/// Validation errors come back as `{"__type": "Validation Error", "name": ["Missing value"]}`
/// without a `message`, so the field errors are folded into the text.
fn remote_error(error: Option<&Value>) -> ClientError {
    let Some(error) = error else {
        return ClientError::Remote {
            error_type: None,
            message: "request failed without an error description".to_string(),
        };
    };

    let error_type = error
        .get("__type")
        .and_then(Value::as_str)
        .map(str::to_string);

    let message = match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message").and_then(Value::as_str) {
            Some(m) => m.to_string(),
            None => {
                let fields: Vec<String> = map
                    .iter()
                    .filter(|(k, _)| k.as_str() != "__type")
                    .map(|(k, v)| format!("{}: {}", k, flatten(v)))
                    .collect();
                if fields.is_empty() {
                    error_type.clone().unwrap_or_else(|| "unknown error".to_string())
                } else {
                    fields.join("; ")
                }
            }
        },
        other => other.to_string(),
    };

    ClientError::Remote {
        error_type,
        message,
    }
}

fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(flatten).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    match trimmed.char_indices().nth(SNIPPET_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
