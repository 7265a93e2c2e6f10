//! Router assembly and the gateway's HTTP handlers.
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    adapters::{
        health_checker::HealthChecker,
        middleware::{auth_gate_middleware, request_id_middleware, request_timing_middleware},
    },
    core::{
        auth_gate::AuthGate,
        proxy::{InboundRequest, RerouteProxy},
        response_cache::ResponseCache,
    },
    error::GatewayError,
    ports::cache_store::CacheStore,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<RerouteProxy>,
    /// `None` when response caching is disabled
    pub response_cache: Option<Arc<ResponseCache>>,
    pub cache_store: Arc<dyn CacheStore>,
    pub health: Arc<HealthChecker>,
}

/// Build the gateway router.
///
/// `/health` is mounted outside the auth gate; everything else, including
/// unmatched paths, passes through it.
pub fn build_router(state: AppState, gate: Arc<AuthGate>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/{service_name}/", reroute_methods())
        .route("/{service_name}/{*path}", reroute_methods())
        .layer(middleware::from_fn_with_state(gate, auth_gate_middleware))
        .route("/health", get(health))
        .layer(middleware::from_fn(request_timing_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `{*path}` never matches an empty tail, so `/{service_name}/` gets its own
/// route with the same methods.
fn reroute_methods() -> MethodRouter<AppState> {
    get(reroute)
        .post(reroute)
        .put(reroute)
        .delete(reroute)
        .patch(reroute)
}

#[derive(Deserialize)]
struct RerouteParams {
    service_name: String,
}

/// Path below the service segment, still percent-encoded as received.
fn downstream_path(uri: &Uri) -> &str {
    uri.path()
        .trim_start_matches('/')
        .split_once('/')
        .map_or("", |(_, rest)| rest)
}

async fn reroute(
    State(state): State<AppState>,
    Path(RerouteParams { service_name }): Path<RerouteParams>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let path = downstream_path(&uri);
    let request = InboundRequest {
        method: method.clone(),
        headers,
        query: uri.query().map(str::to_string),
        body,
    };

    let response = match &state.response_cache {
        Some(cache) => cache
            .get_or_fetch(&method, &service_name, path, uri.query(), || {
                state.proxy.reroute(&request, &service_name, path)
            })
            .await?
            .into_response(),
        None => state
            .proxy
            .reroute(&request, &service_name, path)
            .await?
            .into_response(),
    };
    Ok(response)
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "services": state.proxy.registry().names(),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (services, cache) =
        tokio::join!(state.health.check_services(), state.cache_store.ping());

    let healthy = services.values().all(|health| health.is_ok());
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "cache": cache,
        "services": services,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    (status, Json(body))
}
