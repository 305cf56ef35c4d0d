use serde_json::{Map, Value};

use crate::smartgen_api::cipher::PayloadCipher;
use crate::smartgen_api::error::ApiError;

/// Longest body prefix kept for diagnostics.
pub const SNIPPET_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status_code: u16,
    pub content_type: String,
    pub body_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseClass {
    ParsedJson { status: u16, body: Map<String, Value> },
    HtmlError { status: u16, snippet: String },
    TransportError(ApiError),
}

pub fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_LIMIT).collect()
}

impl RawResponse {
    pub fn looks_like_html(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("text/html")
            || self.body_text.trim_start().starts_with('<')
    }
}

/// Sorts a send outcome into exactly one class. Anything that is not a JSON
/// object is an HTML error for our purposes.
pub fn classify(outcome: Result<RawResponse, ApiError>) -> ResponseClass {
    let raw = match outcome {
        Ok(raw) => raw,
        Err(e) => return ResponseClass::TransportError(e),
    };

    if raw.looks_like_html() {
        return ResponseClass::HtmlError {
            status: raw.status_code,
            snippet: snippet(&raw.body_text),
        };
    }

    match serde_json::from_str::<Value>(&raw.body_text) {
        Ok(Value::Object(body)) => ResponseClass::ParsedJson {
            status: raw.status_code,
            body,
        },
        _ => ResponseClass::HtmlError {
            status: raw.status_code,
            snippet: snippet(&raw.body_text),
        },
    }
}

const CODE_KEYS: &[&str] = &["code", "errcode", "resultCode"];
const MESSAGE_KEYS: &[&str] = &["msg", "message", "error"];
const SUCCESS_CODES: &[i64] = &[0, 200];

fn code_of(body: &Map<String, Value>) -> Option<i64> {
    CODE_KEYS.iter().find_map(|key| match body.get(*key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn message_of(body: &Map<String, Value>) -> String {
    MESSAGE_KEYS
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or("no message")
        .to_string()
}

/// Fails when a parsed JSON envelope reports an application-level error.
pub fn check_envelope(status: u16, body: &Map<String, Value>) -> Result<(), ApiError> {
    let code = code_of(body);
    let http_failed = !(200..300).contains(&status);
    let code_failed = code.is_some_and(|c| !SUCCESS_CODES.contains(&c));
    let flagged = matches!(body.get("success"), Some(Value::Bool(false)));

    if http_failed || code_failed || flagged {
        return Err(ApiError::Rejected {
            code: if code_failed { code } else { Some(status as i64) },
            message: message_of(body),
        });
    }
    Ok(())
}

/// Turns a classified response into the JSON object it carries.
pub fn into_json(class: ResponseClass) -> Result<Map<String, Value>, ApiError> {
    match class {
        ResponseClass::ParsedJson { status, body } => {
            check_envelope(status, &body)?;
            Ok(body)
        }
        ResponseClass::HtmlError { status, snippet } => Err(ApiError::Malformed { status, snippet }),
        ResponseClass::TransportError(e) => Err(e),
    }
}

/// Pulls the device payload out of the vendor envelope.
///
/// `data` may be an object, a list whose first object is used, or a string
/// holding JSON, either plain or encrypted with `cipher`. Anything else leaves
/// the top-level object in place.
pub fn unwrap_payload(
    mut body: Map<String, Value>,
    address: &str,
    cipher: Option<&PayloadCipher>,
) -> Map<String, Value> {
    let inner = match body.remove("data") {
        Some(Value::Object(map)) => Some(map),
        Some(Value::Array(items)) => items.into_iter().find_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        }),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Some(map),
            _ => cipher.and_then(|c| c.decrypt_json(&text)),
        },
        Some(other) => {
            body.insert("data".to_string(), other);
            None
        }
        None => None,
    };

    let mut payload = inner.unwrap_or(body);
    payload
        .entry("device_id")
        .or_insert_with(|| Value::String(address.to_string()));
    payload
}
