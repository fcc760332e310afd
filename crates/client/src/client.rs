//! Request orchestration.
//!
//! ### Pipeline (per logical call)
//! 1. Merge call-site options over instance defaults; resolve a request id.
//! 2. Run request interceptors over the merged config.
//! 3. GET/HEAD only: return a live cached envelope if present.
//! 4. Register a cancellation handle, then loop over attempts:
//!    request transformers, body encoding, transport call raced against the
//!    attempt timeout and caller cancellation, decoding, response
//!    transformers, status check and schema validation. Failures consult the
//!    retry policy and wait out the backoff (cancellable).
//! 5. Cache GET/HEAD successes; invalidate cached reads of the same resource
//!    after a successful POST/PUT/PATCH/DELETE.
//! 6. Run response interceptors over the envelope.
//! 7. Deregister the cancellation handle (on every exit path).

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{self, HeaderValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use tether_core::cache::{compute_cache_key, invalidation_pattern};
use tether_core::{CacheStore, ClientConfig, Clock, Error, SystemClock};

use crate::body::{self, Body};
use crate::cancel::CancellationRegistry;
use crate::ids::{IdGenerator, UuidGenerator};
use crate::interceptor::InterceptorChain;
use crate::request::{RequestConfig, RequestDefaults, RequestOptions};
use crate::response::{ResponseEnvelope, status_text};
use crate::retry::RetryPolicy;
use crate::transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};
use crate::validate::{Schema, create_validator};

/// Per-attempt mutation of the outgoing config.
pub type RequestTransformer = Arc<dyn Fn(RequestConfig) -> Result<RequestConfig, Error> + Send + Sync>;

/// Per-attempt mutation of the decoded response body.
pub type ResponseTransformer = Arc<dyn Fn(Value) -> Result<Value, Error> + Send + Sync>;

/// The request and response interceptor chains of a client.
#[derive(Debug, Default)]
pub struct Interceptors {
    pub request: InterceptorChain<RequestConfig>,
    pub response: InterceptorChain<ResponseEnvelope>,
}

struct Inner {
    defaults: RequestDefaults,
    retry: RetryPolicy,
    transport: Arc<dyn Transport>,
    ids: Arc<dyn IdGenerator>,
    cache: CacheStore<ResponseEnvelope>,
    cancellations: CancellationRegistry,
    interceptors: Interceptors,
    transform_request: Vec<RequestTransformer>,
    transform_response: Vec<ResponseTransformer>,
}

/// HTTP client with caching, retries, interception and response validation.
///
/// Cheap to clone; clones share cache, interceptors and in-flight registry.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Client over the default reqwest transport.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<ResponseEnvelope, Error> {
        self.request(options.method(Method::GET).url(url)).await
    }

    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<ResponseEnvelope, Error> {
        self.request(options.method(Method::HEAD).url(url)).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<ResponseEnvelope, Error> {
        self.request(options.method(Method::DELETE).url(url)).await
    }

    pub async fn post(
        &self, url: &str, body: impl Into<Body>, options: RequestOptions,
    ) -> Result<ResponseEnvelope, Error> {
        self.request(options.method(Method::POST).url(url).body(body)).await
    }

    pub async fn put(
        &self, url: &str, body: impl Into<Body>, options: RequestOptions,
    ) -> Result<ResponseEnvelope, Error> {
        self.request(options.method(Method::PUT).url(url).body(body)).await
    }

    pub async fn patch(
        &self, url: &str, body: impl Into<Body>, options: RequestOptions,
    ) -> Result<ResponseEnvelope, Error> {
        self.request(options.method(Method::PATCH).url(url).body(body)).await
    }

    /// Run one logical call through the full pipeline.
    pub async fn request(&self, options: RequestOptions) -> Result<ResponseEnvelope, Error> {
        let inner = &self.inner;

        let request_id = options.request_id.clone().unwrap_or_else(|| inner.ids.next_id());
        let config = inner.defaults.merge(options, request_id)?;
        let config = inner.interceptors.request.run(config)?;

        let cache_key = (config.is_cacheable() && !config.bypass_cache).then(|| cache_key_for(&config));
        if let Some(key) = &cache_key {
            if let Some(hit) = inner.cache.get(key) {
                tracing::debug!("cache hit: {} {}", config.method, config.url);
                return Ok(hit);
            }
            tracing::debug!("cache miss: {} {}", config.method, config.url);
        }

        let registration = inner.cancellations.register(&config.request_id);
        let envelope = self.execute(&config, registration.token()).await?;

        if let Some(key) = cache_key {
            inner.cache.set(key, envelope.clone(), config.cache_ttl);
        } else if config.is_mutating() {
            self.invalidate_resource(&config);
        }

        let envelope = inner.interceptors.response.run(envelope)?;
        drop(registration);

        Ok(envelope)
    }

    /// Client whose calls all validate against `schema`.
    pub fn create(&self, schema: Schema) -> SchemaClient {
        SchemaClient { client: self.clone(), schema }
    }

    /// Cancel the in-flight request registered under `id`.
    ///
    /// Returns false if no such request is registered.
    pub fn cancel_request(&self, id: &str) -> bool {
        self.inner.cancellations.cancel(id)
    }

    /// Cancel every in-flight request. Returns how many were cancelled.
    pub fn cancel_all_requests(&self) -> usize {
        self.inner.cancellations.cancel_all()
    }

    /// Ids of requests currently registered for cancellation.
    pub fn in_flight(&self) -> Vec<String> {
        self.inner.cancellations.ids()
    }

    pub fn interceptors(&self) -> &Interceptors {
        &self.inner.interceptors
    }

    pub fn cache(&self) -> &CacheStore<ResponseEnvelope> {
        &self.inner.cache
    }

    pub fn defaults(&self) -> &RequestDefaults {
        &self.inner.defaults
    }

    /// Attempt loop. Returns on success, on a non-retryable failure, or once
    /// the retry budget is spent; there is no other exit.
    async fn execute(&self, config: &RequestConfig, cancel: &CancellationToken) -> Result<ResponseEnvelope, Error> {
        let retry = &self.inner.retry;
        let mut attempt: u32 = 0;

        loop {
            let error = match self.attempt(config, cancel).await {
                Ok(envelope) => return Ok(envelope),
                Err(error) => error,
            };

            if !retry.should_retry(&error, attempt) {
                if attempt > 0 {
                    tracing::warn!(
                        request_id = %config.request_id,
                        attempts = attempt + 1,
                        "giving up on {} {}: {}",
                        config.method,
                        config.url,
                        error
                    );
                }
                return Err(error);
            }

            let delay = retry.delay_for(attempt);
            tracing::debug!(
                "attempt {} of {} {} failed ({}), retrying in {:?}",
                attempt + 1,
                config.method,
                config.url,
                error,
                delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(config)),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    async fn attempt(&self, base: &RequestConfig, cancel: &CancellationToken) -> Result<ResponseEnvelope, Error> {
        let inner = &self.inner;

        let mut config = base.clone();
        for transform in &inner.transform_request {
            config = transform(config)?;
        }

        let request = transport_request(&config);
        let response = self.send(request, &config, cancel).await?;

        let mut data = body::decode(&response.headers, &response.body);
        for transform in &inner.transform_response {
            data = transform(data)?;
        }

        let status = response.status;
        if !status.is_success() {
            return Err(Error::ResponseStatus { status: status.as_u16(), status_text: status_text(status), body: data });
        }

        if config.validate
            && let Some(schema) = &config.schema
        {
            data = create_validator(config.validator).validate(data, schema)?;
        }

        Ok(ResponseEnvelope {
            data,
            raw: response.body,
            status,
            status_text: status_text(status),
            headers: response.headers,
            config,
        })
    }

    /// Transport call raced against the attempt deadline and caller cancellation.
    async fn send(
        &self, request: TransportRequest, config: &RequestConfig, cancel: &CancellationToken,
    ) -> Result<TransportResponse, Error> {
        let attempt_token = cancel.child_token();
        let started = tokio::time::Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(config)),
            result = self.inner.transport.send(request, attempt_token.clone()) => result,
            _ = tokio::time::sleep(config.timeout) => {
                attempt_token.cancel();
                let timeout_ms = u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::debug!("{} {} timed out after {}ms", config.method, config.url, timeout_ms);
                return Err(Error::Timeout { timeout_ms });
            }
        };

        match outcome {
            Ok(response) => {
                tracing::debug!(
                    "{} {} -> {} in {:?} ({} bytes)",
                    config.method,
                    config.url,
                    response.status.as_u16(),
                    started.elapsed(),
                    response.body.len()
                );
                Ok(response)
            }
            Err(TransportError::Network(message)) => Err(Error::Network(message)),
            Err(TransportError::Aborted) => Err(cancelled(config)),
        }
    }

    fn invalidate_resource(&self, config: &RequestConfig) {
        match invalidation_pattern(config.url.as_str()) {
            Ok(pattern) => {
                let removed = self.inner.cache.invalidate(pattern);
                tracing::debug!("{} {} invalidated {} cached entries", config.method, config.url, removed);
            }
            Err(e) => tracing::warn!("skipping cache invalidation for {}: {}", config.url, e),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("defaults", &self.inner.defaults)
            .field("retry", &self.inner.retry)
            .field("cache", &self.inner.cache)
            .field("in_flight", &self.inner.cancellations)
            .finish()
    }
}

fn cache_key_for(config: &RequestConfig) -> String {
    let body = config.body.as_ref().map(Body::encode);
    compute_cache_key(config.method.as_str(), config.url.as_str(), body.as_deref())
}

fn transport_request(config: &RequestConfig) -> TransportRequest {
    let mut headers = config.headers.clone();
    let body = config.body.as_ref().map(|body| {
        if !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(body.content_type()));
        }
        body.encode()
    });

    TransportRequest { method: config.method.clone(), url: config.url.clone(), headers, body }
}

fn cancelled(config: &RequestConfig) -> Error {
    Error::Cancelled(format!("request {} was cancelled", config.request_id))
}

/// Builder for [`Client`]. Carries the parts of the configuration that cannot
/// be expressed in [`ClientConfig`].
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    retry: Option<RetryPolicy>,
    transform_request: Vec<RequestTransformer>,
    transform_response: Vec<ResponseTransformer>,
    interceptors: Interceptors,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            retry: None,
            transform_request: Vec::new(),
            transform_response: Vec::new(),
            interceptors: Interceptors::default(),
        }
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Time source for cache expiry.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Replace the retry classification with a custom predicate.
    pub fn should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error, u32) -> bool + Send + Sync + 'static,
    {
        let policy = self.retry.take().unwrap_or_else(|| RetryPolicy::from_settings(&self.config.retry));
        self.retry = Some(policy.with_predicate(predicate));
        self
    }

    pub fn transform_request<F>(mut self, transform: F) -> Self
    where
        F: Fn(RequestConfig) -> Result<RequestConfig, Error> + Send + Sync + 'static,
    {
        self.transform_request.push(Arc::new(transform));
        self
    }

    pub fn transform_response<F>(mut self, transform: F) -> Self
    where
        F: Fn(Value) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.transform_response.push(Arc::new(transform));
        self
    }

    pub fn request_interceptor<F>(self, on_fulfilled: F) -> Self
    where
        F: Fn(RequestConfig) -> Result<RequestConfig, Error> + Send + Sync + 'static,
    {
        self.interceptors.request.register(on_fulfilled, None);
        self
    }

    pub fn response_interceptor<F>(self, on_fulfilled: F) -> Self
    where
        F: Fn(ResponseEnvelope) -> Result<ResponseEnvelope, Error> + Send + Sync + 'static,
    {
        self.interceptors.response.register(on_fulfilled, None);
        self
    }

    /// Validate the configuration and assemble the client.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for invalid settings (including an
    /// unknown validator type) or if the default transport cannot be built.
    pub fn build(self) -> Result<Client, Error> {
        self.config.validate()?;
        let defaults = RequestDefaults::from_config(&self.config)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let retry = self.retry.unwrap_or_else(|| RetryPolicy::from_settings(&self.config.retry));

        tracing::debug!(
            validator = %defaults.validator,
            cache_max_size = self.config.cache.max_size,
            retry_attempts = retry.attempts,
            "client configured"
        );

        Ok(Client {
            inner: Arc::new(Inner {
                defaults,
                retry,
                transport,
                ids: self.ids,
                cache: CacheStore::with_clock(self.config.cache.max_size, self.clock),
                cancellations: CancellationRegistry::new(),
                interceptors: self.interceptors,
                transform_request: self.transform_request,
                transform_response: self.transform_response,
            }),
        })
    }
}

/// Verb set bound to a fixed schema.
///
/// Every call validates against the bound schema. Unless the call picks a
/// validator, the one matching the schema's kind is used.
#[derive(Debug, Clone)]
pub struct SchemaClient {
    client: Client,
    schema: Schema,
}

impl SchemaClient {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<ResponseEnvelope, Error> {
        self.client.get(url, self.bind(options)).await
    }

    pub async fn head(&self, url: &str, options: RequestOptions) -> Result<ResponseEnvelope, Error> {
        self.client.head(url, self.bind(options)).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<ResponseEnvelope, Error> {
        self.client.delete(url, self.bind(options)).await
    }

    pub async fn post(
        &self, url: &str, body: impl Into<Body>, options: RequestOptions,
    ) -> Result<ResponseEnvelope, Error> {
        self.client.post(url, body, self.bind(options)).await
    }

    pub async fn put(
        &self, url: &str, body: impl Into<Body>, options: RequestOptions,
    ) -> Result<ResponseEnvelope, Error> {
        self.client.put(url, body, self.bind(options)).await
    }

    pub async fn patch(
        &self, url: &str, body: impl Into<Body>, options: RequestOptions,
    ) -> Result<ResponseEnvelope, Error> {
        self.client.patch(url, body, self.bind(options)).await
    }

    pub async fn request(&self, options: RequestOptions) -> Result<ResponseEnvelope, Error> {
        self.client.request(self.bind(options)).await
    }

    fn bind(&self, mut options: RequestOptions) -> RequestOptions {
        if options.validator.is_none() {
            options.validator = Some(self.schema.kind());
        }
        options.schema(self.schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use serde_json::json;
    use tether_core::ValidatorKind;

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(
            &self, request: TransportRequest, _cancel: CancellationToken,
        ) -> Result<TransportResponse, TransportError> {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let body = json!({
                "method": request.method.as_str(),
                "url": request.url.as_str(),
                "content_type": request.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            });
            Ok(TransportResponse { status: StatusCode::OK, headers, body: body.to_string().into() })
        }
    }

    fn client() -> Client {
        let config = ClientConfig { base_url: Some("https://api.example.com".into()), ..Default::default() };
        Client::builder(config).transport(Echo).build().unwrap()
    }

    #[test]
    fn test_build_rejects_unknown_validator() {
        let config = ClientConfig { validator_type: "xml".into(), ..Default::default() };
        let err = Client::builder(config).transport(Echo).build().unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("validator_type")));
    }

    #[test]
    fn test_cache_key_includes_body_digest() {
        let defaults = client().defaults().clone();
        let a = defaults
            .merge(RequestOptions::new().method(Method::POST).url("/x").body(json!({"a": 1})), "1".into())
            .unwrap();
        let b = defaults
            .merge(RequestOptions::new().method(Method::POST).url("/x").body(json!({"a": 2})), "2".into())
            .unwrap();
        assert_ne!(cache_key_for(&a), cache_key_for(&b));

        let c = defaults.merge(RequestOptions::new().url("/x"), "3".into()).unwrap();
        let d = defaults.merge(RequestOptions::new().url("/x"), "4".into()).unwrap();
        assert_eq!(cache_key_for(&c), cache_key_for(&d));
    }

    #[test]
    fn test_transport_request_sets_content_type_from_body() {
        let defaults = client().defaults().clone();
        let config = defaults.merge(RequestOptions::new().url("/x").body("hello"), "1".into()).unwrap();
        let request = transport_request(&config);
        assert_eq!(request.headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(request.body.as_deref(), Some(&b"hello"[..]));

        let config = defaults
            .merge(RequestOptions::new().url("/x").body("hello").header("content-type", "text/csv"), "2".into())
            .unwrap();
        assert_eq!(transport_request(&config).headers[header::CONTENT_TYPE], "text/csv");
    }

    #[tokio::test]
    async fn test_verbs_set_method_and_resolve_url() {
        let client = client();

        let response = client.post("/items", json!({"a": 1}), RequestOptions::new()).await.unwrap();
        assert_eq!(response.data["method"], "POST");
        assert_eq!(response.data["url"], "https://api.example.com/items");
        assert_eq!(response.data["content_type"], "application/json");

        let response = client.delete("/items/1", RequestOptions::new()).await.unwrap();
        assert_eq!(response.data["method"], "DELETE");
        assert!(client.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_schema_client_binds_schema_and_validator() {
        let client = client();
        let strict = client.create(
            Schema::json_schema(json!({
                "type": "object",
                "required": ["method", "url"],
                "properties": {"method": {"type": "string"}, "url": {"type": "string"}}
            }))
            .unwrap(),
        );
        assert_eq!(strict.schema().kind(), ValidatorKind::JsonSchema);

        let response = strict.get("/items", RequestOptions::new()).await.unwrap();
        assert_eq!(response.config.validator, ValidatorKind::JsonSchema);

        let failing = client.create(Schema::json_schema(json!({"required": ["missing"]})).unwrap());
        let err = failing.get("/other", RequestOptions::new()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
