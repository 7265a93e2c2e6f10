//! Per-request authentication decision.
//!
//! The gate owns the exact-match allow-list and the [`TokenVerifier`]; the
//! axum stage in `adapters::middleware` only turns its [`AuthDecision`] into
//! "run the next stage" or an error response. Any outcome other than an
//! accepted token or an allow-listed path rejects the request.
use std::{collections::HashSet, sync::Arc};

use axum::http::{HeaderMap, header};

use crate::{
    core::token_verifier::{TokenVerifier, Verification},
    error::GatewayError,
    metrics,
};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, PartialEq, Eq)]
pub enum AuthDecision {
    /// Allow-listed path; no credentials looked at
    Public,
    /// Token accepted
    Authenticated(Verification),
    Rejected(GatewayError),
}

impl AuthDecision {
    pub fn is_passthrough(&self) -> bool {
        !matches!(self, AuthDecision::Rejected(_))
    }
}

pub struct AuthGate {
    excluded_paths: HashSet<String>,
    verifier: Arc<TokenVerifier>,
}

impl AuthGate {
    pub fn new(
        excluded_paths: impl IntoIterator<Item = String>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self {
            excluded_paths: excluded_paths.into_iter().collect(),
            verifier,
        }
    }

    /// Exact string match; `/docs/` and `/docs/x` are not excluded by `/docs`.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.contains(path)
    }

    /// Pull the token out of `Authorization: Bearer <token>`.
    pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, GatewayError> {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .filter(|token| !token.is_empty())
            .ok_or(GatewayError::MissingOrInvalidAuthHeader)
    }

    pub async fn authorize(&self, path: &str, headers: &HeaderMap) -> AuthDecision {
        let decision = if self.is_excluded(path) {
            AuthDecision::Public
        } else {
            match Self::extract_bearer(headers) {
                Ok(token) => match self.verifier.verify(token).await {
                    Ok(how) => AuthDecision::Authenticated(how),
                    Err(e) => AuthDecision::Rejected(e.into()),
                },
                Err(e) => AuthDecision::Rejected(e),
            }
        };

        metrics::increment_auth_decision(decision.label());
        decision
    }
}

impl AuthDecision {
    fn label(&self) -> &'static str {
        match self {
            AuthDecision::Public => "public",
            AuthDecision::Authenticated(how) => how.as_str(),
            AuthDecision::Rejected(GatewayError::MissingOrInvalidAuthHeader) => "missing_header",
            AuthDecision::Rejected(GatewayError::RevokedToken) => "revoked",
            AuthDecision::Rejected(GatewayError::InvalidToken) => "invalid",
            AuthDecision::Rejected(_) => "unavailable",
        }
    }
}
