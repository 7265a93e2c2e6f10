use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use http_body_util::BodyExt;
use hyper::{Request, Response, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tokio::time::timeout;
use tracing::Instrument;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// HTTP/1.1 client adapter using Hyper with Rustls.
///
/// Responsibilities:
/// * Sets `Host` from the target URI; every other header is passed through
///   exactly as given
/// * Speaks HTTP/1.1 only, over plain TCP or TLS
/// * Distinguishes connect failures from failures after connecting
/// * Performs HEAD based health checks with timeout
///
/// Retries are not performed here or anywhere above.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
}

impl HttpClientAdapter {
    pub fn new() -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::debug!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::debug!("Created downstream HTTP client");
        Ok(Self { client })
    }

    fn host_header(req: &Request<AxumBody>) -> HttpClientResult<HeaderValue> {
        let host = req.uri().host().ok_or_else(|| {
            HttpClientError::InvalidRequest(format!("Outgoing URI has no host: {}", req.uri()))
        })?;
        let value = match req.uri().port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        HeaderValue::from_str(&value).map_err(|e| HttpClientError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        mut req: Request<AxumBody>,
    ) -> HttpClientResult<Response<AxumBody>> {
        let host = Self::host_header(&req)?;
        req.headers_mut().insert(header::HOST, host);

        let span = tracing::debug_span!(
            "downstream_request",
            http.method = %req.method(),
            http.url = %req.uri(),
            http.status_code = tracing::field::Empty,
        );

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;
        let outgoing_request = Request::from_parts(parts, body);

        let method = outgoing_request.method().clone();
        let uri = outgoing_request.uri().clone();

        match self
            .client
            .request(outgoing_request)
            .instrument(span.clone())
            .await
        {
            Ok(response) => {
                span.record("http.status_code", response.status().as_u16());

                let (mut parts, hyper_body) = response.into_parts();
                // The body is re-framed by the gateway's own server
                parts.headers.remove(header::TRANSFER_ENCODING);

                Ok(Response::from_parts(parts, AxumBody::new(hyper_body)))
            }
            Err(e) if e.is_connect() => {
                tracing::debug!("Connect to {} failed: {}", uri, e);
                Err(HttpClientError::ConnectionError(format!(
                    "{method} {uri}: {e}"
                )))
            }
            Err(e) => {
                tracing::debug!("Request {} {} failed: {}", method, uri, e);
                Err(HttpClientError::RequestFailed(format!("{method} {uri}: {e}")))
            }
        }
    }

    async fn health_check(&self, url: &str, timeout_secs: u64) -> HttpClientResult<bool> {
        let request = Request::builder()
            .method("HEAD")
            .uri(url)
            .version(Version::HTTP_11)
            .body(AxumBody::empty())
            .map_err(|e| HttpClientError::InvalidRequest(e.to_string()))?;

        match timeout(Duration::from_secs(timeout_secs), self.client.request(request)).await {
            Ok(Ok(response)) => {
                let is_healthy = response.status().is_success();
                let _ = response.into_body().collect().await;
                tracing::debug!("Health check for {} result: {}", url, is_healthy);
                Ok(is_healthy)
            }
            Ok(Err(err)) => {
                tracing::debug!("Health check error for {}: {}", url, err);
                Ok(false)
            }
            Err(_) => {
                tracing::debug!("Health check timeout for {}", url);
                Err(HttpClientError::Timeout(timeout_secs))
            }
        }
    }
}
