//! Request fingerprints used as cache keys.
//!
//! Keys have the form `{METHOD}:{url}:{body-digest}`. The URL stays readable
//! so mutating calls can invalidate by prefix; the body is reduced to a
//! SHA-256 digest so keys stay short.

use regex::Regex;
use sha2::{Digest, Sha256};

/// Compute the cache key for a request.
///
/// `body` is the serialized request body; `None` and an empty body both map
/// to an empty digest segment.
pub fn compute_cache_key(method: &str, url: &str, body: Option<&[u8]>) -> String {
    let digest = match body {
        Some(bytes) if !bytes.is_empty() => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            hex::encode(hasher.finalize())
        }
        _ => String::new(),
    };

    format!("{}:{}:{}", method.to_ascii_uppercase(), url, digest)
}

/// Strip the query string and fragment from a URL.
pub fn base_url(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].trim_end_matches('/')
}

/// Pattern matching every cached GET/HEAD key for the same resource as `url`.
///
/// Query strings are ignored and sub-paths are included, so `POST /items`
/// matches `GET /items?page=2` and `GET /items/7` but not `GET /items2`.
pub fn invalidation_pattern(url: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"^(?:GET|HEAD):{}(?:[/?#:])", regex::escape(base_url(url))))
}
