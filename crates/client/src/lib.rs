//! HTTP client for tether.
//!
//! This crate provides the request pipeline: option merging, interceptor
//! chains, response caching, retries with backoff, cancellation by request id
//! and schema validation of response bodies, over a pluggable transport.

pub mod body;
pub mod cancel;
pub mod client;
pub mod ids;
pub mod interceptor;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;
pub mod validate;

pub use body::Body;
pub use cancel::{CancellationRegistry, Registration};
pub use client::{Client, ClientBuilder, Interceptors, RequestTransformer, ResponseTransformer, SchemaClient};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use interceptor::{InterceptorChain, OnFulfilled, OnRejected};
pub use request::{RequestConfig, RequestDefaults, RequestOptions};
pub use response::ResponseEnvelope;
pub use retry::{RetryPolicy, RetryPredicate};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};
pub use validate::{Schema, Validator, create_validator, validator_for};

pub use reqwest::Method;
pub use tether_core::{ClientConfig, Error, ErrorKind, ValidatorKind};
