//! Transport boundary.
//!
//! The client never talks to the network itself. Everything below the HTTP
//! request/response level (pooling, TLS, DNS, redirects, decompression) is the
//! job of a [`Transport`]. [`ReqwestTransport`] is the default implementation.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode, Url, header::HeaderMap};
use tokio_util::sync::CancellationToken;

use tether_core::Error;

/// A fully resolved request as handed to the transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    /// Encoded body bytes, if any.
    pub body: Option<Bytes>,
}

/// Raw response returned by the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Errors a transport may report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection, protocol or body read failure.
    #[error("network error: {0}")]
    Network(String),

    /// The cancellation token fired before the exchange completed.
    #[error("request aborted")]
    Aborted,
}

/// Host-provided network capability.
///
/// Implementations must return promptly with [`TransportError::Aborted`] once
/// `cancel` fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self, request: TransportRequest, cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError>;
}

/// Transport backed by a shared `reqwest::Client`.
///
/// No client-level timeout is configured; deadlines are enforced per attempt
/// by the caller.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Create a transport with rustls and transparent decompression.
    pub fn new() -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http })
    }

    /// Wrap an existing reqwest client.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self, request: TransportRequest, cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = self.http.request(request.method, request.url).headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|e| TransportError::Network(e.to_string()))?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::Network(format!("failed to read response: {}", e)))?;

            Ok::<_, TransportError>(TransportResponse { status, headers, body })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Aborted),
            result = exchange => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reqwest_transport_new() {
        assert!(ReqwestTransport::new().is_ok());
    }

    #[tokio::test]
    async fn test_reqwest_transport_honours_cancellation() {
        let transport = ReqwestTransport::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = TransportRequest {
            method: Method::GET,
            url: Url::parse("http://192.0.2.1:9/").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        };

        let result = transport.send(request, cancel).await;
        assert!(matches!(result, Err(TransportError::Aborted)));
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Network("reset".into()).to_string(), "network error: reset");
        assert_eq!(TransportError::Aborted.to_string(), "request aborted");
    }
}
