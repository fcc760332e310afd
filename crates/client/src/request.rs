//! Per-call options and the merged request configuration.
//!
//! Precedence is field by field: call-site options override instance
//! defaults, which override library defaults. Headers merge key by key with
//! the same precedence.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;

use tether_core::{ClientConfig, Error, ValidatorKind};

use crate::body::Body;
use crate::validate::Schema;

/// Call-site overrides. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub url: Option<String>,
    pub body: Option<Body>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub bypass_cache: Option<bool>,
    pub cache_ttl: Option<Duration>,
    pub validate: Option<bool>,
    pub validator: Option<ValidatorKind>,
    pub schema: Option<Schema>,
    pub request_id: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        self.body = Some(Body::json(value)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = Some(bypass);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn validator(mut self, kind: ValidatorKind) -> Self {
        self.validator = Some(kind);
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Fully merged configuration for one logical call.
///
/// `url` is the resolved target and the one sent to the transport; hooks that
/// retarget a request should edit it. `target` echoes what the caller passed.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub request_id: String,
    pub method: Method,
    pub target: String,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Body>,
    pub timeout: Duration,
    pub bypass_cache: bool,
    pub cache_ttl: Duration,
    pub validate: bool,
    pub validator: ValidatorKind,
    pub schema: Option<Schema>,
}

impl RequestConfig {
    /// GET and HEAD responses are cacheable.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }

    /// POST, PUT, PATCH and DELETE invalidate cached reads of the same resource.
    pub fn is_mutating(&self) -> bool {
        [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(&self.method)
    }
}

/// Instance-level defaults derived from a [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub base_url: Option<Url>,
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub validate: bool,
    pub validator: ValidatorKind,
    pub cache_ttl: Duration,
}

impl RequestDefaults {
    /// # Errors
    ///
    /// Returns `Error::Configuration` for an unknown validator type, an
    /// unparseable base URL or an invalid default header.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|base| Url::parse(base).map_err(|e| Error::Configuration(format!("invalid base_url '{}': {}", base, e))))
            .transpose()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        Ok(Self {
            base_url,
            headers,
            timeout: config.timeout(),
            validate: config.validate_response,
            validator: config.validator_kind()?,
            cache_ttl: config.cache.default_ttl(),
        })
    }

    /// Merge call-site `options` over these defaults.
    pub fn merge(&self, options: RequestOptions, request_id: String) -> Result<RequestConfig, Error> {
        let target = options
            .url
            .ok_or_else(|| Error::Configuration("request has no URL".into()))?;

        let mut url = resolve_url(self.base_url.as_ref(), &target)?;
        if !options.query.is_empty() {
            url.query_pairs_mut().extend_pairs(options.query.iter());
        }

        let mut headers = self.headers.clone();
        for (name, value) in &options.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        Ok(RequestConfig {
            request_id,
            method: options.method.unwrap_or(Method::GET),
            target,
            url,
            headers,
            body: options.body,
            timeout: options.timeout.unwrap_or(self.timeout),
            bypass_cache: options.bypass_cache.unwrap_or(false),
            cache_ttl: options.cache_ttl.unwrap_or(self.cache_ttl),
            validate: options.validate.unwrap_or(self.validate),
            validator: options.validator.unwrap_or(self.validator),
            schema: options.schema,
        })
    }
}

/// Resolve `target` against an optional base URL.
///
/// Targets that parse as absolute URLs are used as-is. Relative targets are
/// appended to the base with exactly one `/` between them.
pub fn resolve_url(base: Option<&Url>, target: &str) -> Result<Url, Error> {
    let target = target.trim();

    match Url::parse(target) {
        Ok(url) => return Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(e) => return Err(Error::Configuration(format!("invalid URL '{}': {}", target, e))),
    }

    let Some(base) = base else {
        return Err(Error::Configuration(format!("relative URL '{}' requires a base_url", target)));
    };

    let joined = if target.is_empty() {
        base.as_str().to_string()
    } else {
        format!("{}/{}", base.as_str().trim_end_matches('/'), target.trim_start_matches('/'))
    };

    Url::parse(&joined).map_err(|e| Error::Configuration(format!("invalid URL '{}': {}", joined, e)))
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::Configuration(format!("invalid header name '{}': {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| Error::Configuration(format!("invalid value for header '{}': {}", name, e)))?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn defaults() -> RequestDefaults {
        let config = ClientConfig {
            base_url: Some("https://api.example.com/v1".into()),
            default_headers: BTreeMap::from([
                ("accept".to_string(), "application/json".to_string()),
                ("x-client".to_string(), "tether".to_string()),
            ]),
            timeout_ms: 5_000,
            ..Default::default()
        };
        RequestDefaults::from_config(&config).unwrap()
    }

    #[test]
    fn test_resolve_relative_url() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        assert_eq!(resolve_url(Some(&base), "/items").unwrap().as_str(), "https://api.example.com/v1/items");
        assert_eq!(resolve_url(Some(&base), "items?x=1").unwrap().as_str(), "https://api.example.com/v1/items?x=1");
    }

    #[test]
    fn test_resolve_absolute_url_ignores_base() {
        let base = Url::parse("https://api.example.com/v1").unwrap();
        let url = resolve_url(Some(&base), "http://other.test/x").unwrap();
        assert_eq!(url.as_str(), "http://other.test/x");
    }

    #[test]
    fn test_resolve_relative_url_with_url_in_query() {
        let base = Url::parse("https://api.example.com").unwrap();
        let url = resolve_url(Some(&base), "/proxy?target=https://other.test/x").unwrap();
        assert_eq!(url.host_str(), Some("api.example.com"));
        assert_eq!(url.path(), "/proxy");
        assert_eq!(url.query_pairs().next().unwrap().1, "https://other.test/x");
    }

    #[test]
    fn test_resolve_relative_without_base() {
        let result = resolve_url(None, "/items");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_merge_uses_defaults() {
        let config = defaults().merge(RequestOptions::new().url("/items"), "req-1".into()).unwrap();

        assert_eq!(config.request_id, "req-1");
        assert_eq!(config.method, Method::GET);
        assert_eq!(config.target, "/items");
        assert_eq!(config.url.as_str(), "https://api.example.com/v1/items");
        assert_eq!(config.timeout, Duration::from_millis(5_000));
        assert_eq!(config.cache_ttl, Duration::from_millis(300_000));
        assert!(config.validate);
        assert_eq!(config.validator, ValidatorKind::Serde);
        assert!(!config.bypass_cache);
        assert_eq!(config.headers["accept"], "application/json");
    }

    #[test]
    fn test_merge_call_site_wins_field_by_field() {
        let options = RequestOptions::new()
            .method(Method::POST)
            .url("/items")
            .header("accept", "text/plain")
            .query("page", "2")
            .timeout(Duration::from_millis(10))
            .bypass_cache(true)
            .cache_ttl(Duration::from_secs(1))
            .validate(false)
            .validator(ValidatorKind::JsonSchema);

        let config = defaults().merge(options, "req-2".into()).unwrap();

        assert_eq!(config.method, Method::POST);
        assert_eq!(config.url.as_str(), "https://api.example.com/v1/items?page=2");
        assert_eq!(config.headers["accept"], "text/plain");
        assert_eq!(config.headers["x-client"], "tether");
        assert_eq!(config.timeout, Duration::from_millis(10));
        assert!(config.bypass_cache);
        assert_eq!(config.cache_ttl, Duration::from_secs(1));
        assert!(!config.validate);
        assert_eq!(config.validator, ValidatorKind::JsonSchema);
    }

    #[test]
    fn test_merge_requires_url() {
        let result = defaults().merge(RequestOptions::new(), "req".into());
        assert!(matches!(result, Err(Error::Configuration(msg)) if msg.contains("no URL")));
    }

    #[test]
    fn test_invalid_header_is_configuration_error() {
        let options = RequestOptions::new().url("/x").header("bad header", "v");
        let result = defaults().merge(options, "req".into());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_defaults_reject_unknown_validator() {
        let config = ClientConfig { validator_type: "xml".into(), ..Default::default() };
        assert!(matches!(RequestDefaults::from_config(&config), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_cacheable_and_mutating_methods() {
        let merge = |method: Method| defaults().merge(RequestOptions::new().method(method).url("/x"), "r".into()).unwrap();

        assert!(merge(Method::GET).is_cacheable());
        assert!(merge(Method::HEAD).is_cacheable());
        assert!(!merge(Method::POST).is_cacheable());
        assert!(merge(Method::DELETE).is_mutating());
        assert!(merge(Method::PATCH).is_mutating());
        assert!(!merge(Method::GET).is_mutating());
        assert!(!merge(Method::OPTIONS).is_mutating());
    }
}
