//! Memoization of GET responses in the [`CacheStore`].
//!
//! Keys are `<hash_name>:<service>:<path>:<normalized query>`. A hit is
//! rendered from the stored payload alone (status 200); a miss runs the
//! handler and stores successful UTF-8 bodies with the configured TTL. The
//! store being down never fails a request.
use std::{future::Future, sync::Arc, time::Duration};

use axum::{
    body::Body as AxumBody,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{core::proxy::ProxyResponse, metrics, ports::cache_store::CacheStore};

pub const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(30);
pub const CACHE_STATUS_HEADER: &str = "x-gateway-cache";

/// Value read back from the response cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPayload {
    Structured(Value),
    Raw(String),
}

impl CachedPayload {
    /// JSON when the stored text parses as JSON, raw text otherwise.
    pub fn decode(stored: &str) -> Self {
        match serde_json::from_str(stored) {
            Ok(value) => CachedPayload::Structured(value),
            Err(_) => CachedPayload::Raw(stored.to_string()),
        }
    }

    /// Storage form of a response body: compact JSON if the body is JSON, the
    /// text itself otherwise. `None` for non-UTF-8 bodies.
    pub fn encode(body: &[u8]) -> Option<String> {
        if let Ok(value) = serde_json::from_slice::<Value>(body) {
            return serde_json::to_string(&value).ok();
        }
        std::str::from_utf8(body).ok().map(str::to_string)
    }
}

impl IntoResponse for CachedPayload {
    fn into_response(self) -> Response {
        let (content_type, body) = match self {
            CachedPayload::Structured(value) => ("application/json", value.to_string()),
            CachedPayload::Raw(text) => ("text/plain; charset=utf-8", text),
        };

        let mut response = Response::new(AxumBody::from(body));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static("hit"));
        response
    }
}

#[derive(Debug)]
pub enum CacheOutcome {
    Hit(CachedPayload),
    /// Handler ran; its response is returned as-is
    Fresh(ProxyResponse),
}

impl IntoResponse for CacheOutcome {
    fn into_response(self) -> Response {
        match self {
            CacheOutcome::Hit(payload) => payload.into_response(),
            CacheOutcome::Fresh(response) => response.into_response(),
        }
    }
}

/// Decode every pair and re-encode it, keeping the original order, so that
/// `a=%41` and `a=A` share a key.
pub fn normalize_query(query: Option<&str>) -> String {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return String::new();
    };
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(url::form_urlencoded::parse(query.as_bytes()))
        .finish()
}

pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    hash_name: String,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, hash_name: impl Into<String>) -> Self {
        Self {
            store,
            hash_name: hash_name.into(),
            ttl: DEFAULT_RESPONSE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cache_key(&self, service: &str, path: &str, query: Option<&str>) -> String {
        format!(
            "{}:{}:{}:{}",
            self.hash_name,
            service,
            path,
            normalize_query(query)
        )
    }

    /// Serve `GET`s from the cache, running `fetch` on a miss; every other
    /// method runs `fetch` directly. Errors from `fetch` are passed through
    /// and never cached.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        method: &Method,
        service: &str,
        path: &str,
        query: Option<&str>,
        fetch: F,
    ) -> Result<CacheOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProxyResponse, E>>,
    {
        if *method != Method::GET {
            return fetch().await.map(CacheOutcome::Fresh);
        }

        if !self.store.ping().await {
            tracing::debug!(service, "Response cache unavailable; bypassing");
            metrics::increment_response_cache(service, "bypass");
            return fetch().await.map(CacheOutcome::Fresh);
        }

        let key = self.cache_key(service, path, query);
        if let Some(stored) = self.store.get(&key).await {
            tracing::debug!(key = %key, "Response cache hit");
            metrics::increment_response_cache(service, "hit");
            return Ok(CacheOutcome::Hit(CachedPayload::decode(&stored)));
        }

        metrics::increment_response_cache(service, "miss");
        let response = fetch().await?;

        if response.status.is_success() {
            match CachedPayload::encode(&response.body) {
                Some(encoded) => {
                    if !self.store.set(&key, &encoded, Some(self.ttl)).await {
                        tracing::debug!(key = %key, "Could not store response");
                    }
                }
                None => tracing::debug!(key = %key, "Response body is not UTF-8; not cached"),
            }
        }

        Ok(CacheOutcome::Fresh(response))
    }
}
