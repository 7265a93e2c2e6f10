use async_trait::async_trait;
use thiserror::Error;

/// Failure to obtain an answer from the token authority.
///
/// This is deliberately distinct from the authority answering "invalid":
/// the latter is `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthorityError {
    /// Error when the authority cannot be reached or the call times out
    #[error("Token authority unreachable: {0}")]
    Unreachable(String),

    /// Error when the authority request cannot be built
    #[error("Invalid authority request: {0}")]
    InvalidRequest(String),
}

/// TokenAuthority defines the port for the remote, authoritative token check.
#[async_trait]
pub trait TokenAuthority: Send + Sync + 'static {
    /// Ask the authority whether `token` is valid.
    ///
    /// # Returns
    /// `Ok(true)` if accepted, `Ok(false)` if refused, `Err` if no answer
    /// could be obtained.
    async fn verify(&self, token: &str) -> Result<bool, AuthorityError>;
}
