//! Response envelope returned by every successful call.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use tether_core::Error;

use crate::request::RequestConfig;

/// A decoded response together with the configuration that produced it.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    /// Decoded (and, when a schema is set, validated) body.
    pub data: Value,
    /// Body bytes as received.
    pub raw: Bytes,
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    /// The resolved request configuration, after request interceptors.
    pub config: RequestConfig,
}

impl ResponseEnvelope {
    /// Deserialize `data` into `T`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the data does not fit `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| Error::Validation(format!("response data does not match requested type: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Reason phrase for a status, empty for unregistered codes.
pub fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RequestDefaults, RequestOptions};
    use serde::Deserialize;
    use serde_json::json;
    use tether_core::ClientConfig;

    fn envelope(data: Value) -> ResponseEnvelope {
        let config = RequestDefaults::from_config(&ClientConfig::default())
            .unwrap()
            .merge(RequestOptions::new().url("https://example.com/items"), "req-1".into())
            .unwrap();

        ResponseEnvelope {
            raw: Bytes::from(data.to_string()),
            data,
            status: StatusCode::OK,
            status_text: status_text(StatusCode::OK),
            headers: HeaderMap::new(),
            config,
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn test_json_extraction() {
        let response = envelope(json!({"id": 4}));
        assert_eq!(response.json::<Item>().unwrap(), Item { id: 4 });
        assert!(response.is_success());
        assert_eq!(response.status_text, "OK");
    }

    #[test]
    fn test_json_mismatch_is_validation_error() {
        let response = envelope(json!("text"));
        assert!(matches!(response.json::<Item>(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_status_text_for_unregistered_code() {
        assert_eq!(status_text(StatusCode::from_u16(599).unwrap()), "");
        assert_eq!(status_text(StatusCode::SERVICE_UNAVAILABLE), "Service Unavailable");
    }
}
