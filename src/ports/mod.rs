//! Ports: the traits the core depends on. Adapters implement them.
pub mod cache_store;
pub mod http_client;
pub mod token_authority;

pub use cache_store::{CacheError, CacheStore};
pub use http_client::{HttpClient, HttpClientError, HttpClientResult};
pub use token_authority::{AuthorityError, TokenAuthority};
