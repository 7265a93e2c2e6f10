use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr, eyre};
use reqwest::{Client, StatusCode};

use crate::{
    config::models::AuthConfig,
    core::registry::ServicesRegistry,
    ports::token_authority::{AuthorityError, TokenAuthority},
};

/// Token authority reached over HTTP: `POST <verify_url>` with the token as
/// a bearer credential. Only a `200 OK` accepts the token; every other status
/// refuses it. Transport failures and timeouts are reported as errors.
pub struct HttpTokenAuthority {
    client: Client,
    verify_url: String,
}

impl HttpTokenAuthority {
    pub fn new(verify_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build token authority HTTP client")?;

        Ok(Self {
            client,
            verify_url: verify_url.into(),
        })
    }

    /// Resolve the authority service in the registry and point at its
    /// verification endpoint (`base_url + prefix + verify_path`).
    pub fn from_registry(registry: &ServicesRegistry, auth: &AuthConfig) -> Result<Self> {
        let service = registry
            .get(&auth.authority_service)
            .map_err(|e| eyre!("Token authority not registered: {e}"))?;
        let verify_url = format!("{}{}", service.root_url(), auth.verify_path);

        tracing::info!(
            authority = %service.name,
            url = %verify_url,
            "Token authority configured"
        );
        Self::new(verify_url, Duration::from_secs(auth.verify_timeout_secs))
    }

    pub fn verify_url(&self) -> &str {
        &self.verify_url
    }
}

#[async_trait]
impl TokenAuthority for HttpTokenAuthority {
    async fn verify(&self, token: &str) -> Result<bool, AuthorityError> {
        let response = self
            .client
            .post(&self.verify_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    AuthorityError::InvalidRequest(e.to_string())
                } else {
                    AuthorityError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::debug!(status = status.as_u16(), "Token authority refused token");
        }
        Ok(status == StatusCode::OK)
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::HeaderMap, routing::post};

    use super::*;
    use crate::config::models::ServiceConfig;

    async fn spawn_authority() -> String {
        let app = Router::new().route(
            "/api/v1/verify_token",
            post(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer good") => StatusCode::OK,
                    Some("Bearer expired") => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::UNAUTHORIZED,
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let base = spawn_authority().await;
        let authority = HttpTokenAuthority::new(
            format!("{base}/api/v1/verify_token"),
            Duration::from_secs(2),
        )
        .unwrap();

        assert_eq!(authority.verify("good").await, Ok(true));
        assert_eq!(authority.verify("bad").await, Ok(false));
        assert_eq!(authority.verify("expired").await, Ok(false));
    }

    #[tokio::test]
    async fn test_unreachable_authority() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let authority =
            HttpTokenAuthority::new(format!("http://{addr}/verify_token"), Duration::from_secs(1))
                .unwrap();
        assert!(matches!(
            authority.verify("good").await,
            Err(AuthorityError::Unreachable(_))
        ));
    }

    #[test]
    fn test_from_registry() {
        let registry = ServicesRegistry::new([ServiceConfig::builder(
            "users_service",
            "http://users:8000",
        )
        .prefix("/api/v1")
        .build()]);

        let authority = HttpTokenAuthority::from_registry(&registry, &AuthConfig::default()).unwrap();
        assert_eq!(authority.verify_url(), "http://users:8000/api/v1/verify_token");

        let missing = AuthConfig {
            authority_service: "auth_service".to_string(),
            ..AuthConfig::default()
        };
        assert!(HttpTokenAuthority::from_registry(&registry, &missing).is_err());
    }
}
