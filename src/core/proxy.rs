//! Reroute proxy: forwards one inbound request to a registered service.
//!
//! The downstream URL is `base_url + prefix + "/" + path`, the query string is
//! appended verbatim. Method, headers (minus `host` and `content-length`) and
//! body are forwarded unchanged; the downstream status, headers (minus
//! `transfer-encoding`) and buffered body are relayed back. There are no
//! retries.
use std::{sync::Arc, time::Duration};

use axum::{
    body::Body as AxumBody,
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use thiserror::Error;

use crate::{
    core::registry::{RegistryError, ServicesRegistry},
    error::GatewayError,
    metrics,
    ports::http_client::{HttpClient, HttpClientError},
};

pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Connect failure (refused, DNS, reset before response)
    #[error("Service connection error: {0}")]
    ServiceUnavailable(String),

    #[error("Downstream call exceeded {0:?}")]
    Timeout(Duration),

    #[error("Proxy failure: {0}")]
    InternalError(String),
}

impl From<RegistryError> for ProxyError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownService(name) => ProxyError::UnknownService(name),
        }
    }
}

impl From<ProxyError> for GatewayError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::UnknownService(name) => GatewayError::UnknownService(name),
            ProxyError::ServiceUnavailable(detail) => GatewayError::ServiceUnavailable(detail),
            ProxyError::Timeout(after) => GatewayError::Timeout(after),
            ProxyError::InternalError(detail) => GatewayError::InternalError(detail),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        GatewayError::from(self).into_response()
    }
}

/// The parts of the inbound request that are forwarded.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    /// Raw query string without the leading `?`
    pub query: Option<String>,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            query: None,
            body: Bytes::new(),
        }
    }
}

/// Fully buffered downstream response.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(AxumBody::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        // The body is buffered; the server re-frames it.
        response.headers_mut().remove(header::TRANSFER_ENCODING);
        response
    }
}

/// Inbound headers minus `host` and `content-length`; the client sets both
/// for the outgoing request.
pub fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    forwarded.remove(header::HOST);
    forwarded.remove(header::CONTENT_LENGTH);
    forwarded
}

pub struct RerouteProxy {
    registry: Arc<ServicesRegistry>,
    http_client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl RerouteProxy {
    pub fn new(registry: Arc<ServicesRegistry>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            registry,
            http_client,
            timeout: DEFAULT_PROXY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ServicesRegistry {
        &self.registry
    }

    /// Downstream URL for `service_name` / `path`, resolved through the registry.
    pub fn target_url(
        &self,
        service_name: &str,
        path: &str,
        query: Option<&str>,
    ) -> Result<String, ProxyError> {
        let service = self.registry.get(service_name)?;
        let mut url = format!("{}/{}", service.root_url(), path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        Ok(url)
    }

    pub async fn reroute(
        &self,
        request: &InboundRequest,
        service_name: &str,
        path: &str,
    ) -> Result<ProxyResponse, ProxyError> {
        let target = self.target_url(service_name, path, request.query.as_deref())?;
        let method = request.method.clone();

        let mut outgoing = Request::builder()
            .method(method.clone())
            .uri(&target)
            .body(AxumBody::from(request.body.clone()))
            .map_err(|e| ProxyError::InternalError(format!("invalid target {target}: {e}")))?;
        *outgoing.headers_mut() = forwarded_headers(&request.headers);

        tracing::debug!(service = service_name, %method, target = %target, "Rerouting request");

        let _timer = metrics::BackendRequestTimer::new(service_name, method.as_str());
        let exchange = async {
            let response = self
                .http_client
                .send_request(outgoing)
                .await
                .map_err(|e| self.map_client_error(e))?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| ProxyError::InternalError(format!("reading response body: {e}")))?
                .to_bytes();
            Ok::<_, ProxyError>(ProxyResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        let result = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::Timeout(self.timeout)),
        };

        match &result {
            Ok(response) => {
                metrics::increment_backend_request_total(
                    service_name,
                    method.as_str(),
                    response.status.as_u16(),
                );
            }
            Err(e) => {
                tracing::warn!(service = service_name, %method, target = %target, error = %e, "Reroute failed");
                metrics::increment_backend_request_total(service_name, method.as_str(), 599);
            }
        }
        result
    }

    fn map_client_error(&self, err: HttpClientError) -> ProxyError {
        match err {
            HttpClientError::ConnectionError(detail) => ProxyError::ServiceUnavailable(detail),
            HttpClientError::Timeout(_) => ProxyError::Timeout(self.timeout),
            other => ProxyError::InternalError(other.to_string()),
        }
    }
}
