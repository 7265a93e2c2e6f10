//! Bearer token verification with a distributed cache fast path.
//!
//! Order of checks for every token:
//! 1. `black_list_jwt:<fp>` present → [`VerifyError::Revoked`]
//! 2. `jwt:<fp>` present → accepted without contacting the authority
//! 3. otherwise ask the [`TokenAuthority`]; on acceptance cache `jwt:<fp>`
//!    for `token_ttl` so the next request within that window takes step 2.
//!
//! The blacklist check always precedes the validity check. `token_ttl` bounds
//! how long a token revoked elsewhere (without touching the blacklist) can
//! still be accepted.
use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    core::fingerprint::TokenFingerprint,
    error::GatewayError,
    ports::{cache_store::CacheStore, token_authority::TokenAuthority},
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token is blacklisted")]
    Revoked,
    #[error("token rejected by authority")]
    InvalidToken,
    #[error("token authority unavailable: {0}")]
    VerificationUnavailable(String),
}

impl From<VerifyError> for GatewayError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Revoked => GatewayError::RevokedToken,
            VerifyError::InvalidToken => GatewayError::InvalidToken,
            VerifyError::VerificationUnavailable(detail) => {
                GatewayError::VerificationUnavailable(detail)
            }
        }
    }
}

/// How an accepted token was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Found under `jwt:<fp>`
    Cached,
    /// Confirmed by the authority just now
    Authority,
}

impl Verification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verification::Cached => "cached",
            Verification::Authority => "authority",
        }
    }
}

pub struct TokenVerifier {
    cache: Arc<dyn CacheStore>,
    authority: Arc<dyn TokenAuthority>,
    token_ttl: Duration,
    blacklist_ttl: Duration,
}

impl TokenVerifier {
    pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60);
    pub const DEFAULT_BLACKLIST_TTL: Duration = Duration::from_secs(300);

    pub fn new(cache: Arc<dyn CacheStore>, authority: Arc<dyn TokenAuthority>) -> Self {
        Self {
            cache,
            authority,
            token_ttl: Self::DEFAULT_TOKEN_TTL,
            blacklist_ttl: Self::DEFAULT_BLACKLIST_TTL,
        }
    }

    pub fn with_ttls(mut self, token_ttl: Duration, blacklist_ttl: Duration) -> Self {
        self.token_ttl = token_ttl;
        self.blacklist_ttl = blacklist_ttl;
        self
    }

    pub async fn verify(&self, token: &str) -> Result<Verification, VerifyError> {
        let fingerprint = TokenFingerprint::of(token);

        if self.cache.get(&fingerprint.blacklist_key()).await.is_some() {
            tracing::info!(token = fingerprint.short(), "Rejected blacklisted token");
            return Err(VerifyError::Revoked);
        }

        if self.cache.get(&fingerprint.validity_key()).await.is_some() {
            tracing::debug!(token = fingerprint.short(), "Token accepted from cache");
            return Ok(Verification::Cached);
        }

        match self.authority.verify(token).await {
            Ok(true) => {
                if !self
                    .cache
                    .set(&fingerprint.validity_key(), token, Some(self.token_ttl))
                    .await
                {
                    tracing::warn!(
                        token = fingerprint.short(),
                        "Could not cache verified token; next request will re-verify"
                    );
                }
                tracing::debug!(token = fingerprint.short(), "Token confirmed by authority");
                Ok(Verification::Authority)
            }
            Ok(false) => {
                tracing::info!(token = fingerprint.short(), "Token refused by authority");
                Err(VerifyError::InvalidToken)
            }
            Err(e) => {
                tracing::error!(token = fingerprint.short(), error = %e, "Token authority unavailable");
                Err(VerifyError::VerificationUnavailable(e.to_string()))
            }
        }
    }

    /// Put `token` on the blacklist and drop its cached validity.
    ///
    /// Returns whether the blacklist entry was written.
    pub async fn revoke(&self, token: &str) -> bool {
        let fingerprint = TokenFingerprint::of(token);
        let blacklisted = self
            .cache
            .set(&fingerprint.blacklist_key(), token, Some(self.blacklist_ttl))
            .await;
        self.cache.delete(&fingerprint.validity_key()).await;
        tracing::info!(token = fingerprint.short(), blacklisted, "Token revoked");
        blacklisted
    }

    /// Mark `token` as verified for `token_ttl`, e.g. right after login.
    pub async fn remember(&self, token: &str) -> bool {
        let fingerprint = TokenFingerprint::of(token);
        self.cache
            .set(&fingerprint.validity_key(), token, Some(self.token_ttl))
            .await
    }
}
