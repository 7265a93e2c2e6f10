//! Axum middleware stages of the gateway.
//!
//! Applied outermost first: request id, request timing, auth gate. Each stage
//! receives the request and the `Next` continuation and either runs it or
//! answers on its own.
use std::{sync::Arc, time::Instant};

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::{
    core::auth_gate::{AuthDecision, AuthGate},
    metrics,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Log start/end of a request including latency.
pub async fn request_timing_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let _timer = metrics::RequestTimer::new(&path, method.as_str());

    tracing::debug!("Started processing {} {}", method, path);

    let response = next.run(req).await;

    tracing::info!(
        "Completed {} {} - {} in {:?}",
        method,
        path,
        response.status(),
        start.elapsed()
    );
    metrics::increment_request_total(&path, method.as_str(), response.status().as_u16());

    response
}

/// Generate a per-request UUID and expose it via tracing plus `X-Request-ID`.
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %request_id);

    let mut response = next.run(req).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Run the rest of the chain only when the [`AuthGate`] lets the request
/// through; otherwise answer with the rejection.
pub async fn auth_gate_middleware(
    State(gate): State<Arc<AuthGate>>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path();

    match gate.authorize(path, &parts.headers).await {
        AuthDecision::Rejected(err) => {
            tracing::debug!(path = %path, error = %err, "Request rejected by auth gate");
            err.into_response()
        }
        decision => {
            tracing::trace!(path = %path, ?decision, "Request admitted");
            next.run(Request::from_parts(parts, body)).await
        }
    }
}
