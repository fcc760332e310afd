//! Request body encoding and response body decoding.
//!
//! The content type of an outgoing request is derived from the payload
//! variant; the decoded form of an incoming body is chosen from its
//! `Content-Type` header.

use bytes::Bytes;
use reqwest::header::{self, HeaderMap};
use serde::Serialize;
use serde_json::Value;

use tether_core::Error;

/// Outgoing request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized as JSON, sent as `application/json`.
    Json(Value),
    /// Sent as `text/plain; charset=utf-8`.
    Text(String),
    /// Sent as `application/octet-stream`.
    Bytes(Bytes),
    /// Sent as `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
}

impl Body {
    /// Serialize any value into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| Error::Configuration(format!("request body is not serializable: {}", e)))
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Body::Json(_) => "application/json",
            Body::Text(_) => "text/plain; charset=utf-8",
            Body::Bytes(_) => "application/octet-stream",
            Body::Form(_) => "application/x-www-form-urlencoded",
        }
    }

    /// Wire bytes for this payload.
    pub fn encode(&self) -> Bytes {
        match self {
            Body::Json(value) => Bytes::from(value.to_string()),
            Body::Text(text) => Bytes::from(text.clone()),
            Body::Bytes(bytes) => bytes.clone(),
            Body::Form(pairs) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs.iter())
                    .finish();
                Bytes::from(encoded)
            }
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

/// Decode a response body according to its content type.
///
/// - empty bodies decode to `null`
/// - JSON content types (`application/json`, `*+json`) are parsed, falling
///   back to the raw text when the payload is not valid JSON
/// - anything else decodes to a string when it is valid UTF-8, else `null`
///   (the raw bytes stay available on the envelope)
pub fn decode(headers: &HeaderMap, bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if is_json(&content_type) {
        match serde_json::from_slice(bytes) {
            Ok(value) => return value,
            Err(e) => tracing::debug!("response declared JSON but failed to parse: {}", e),
        }
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Value::String(text.to_string()),
        Err(_) => Value::Null,
    }
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    essence == "application/json" || essence.ends_with("+json")
}
