pub mod health_checker;
pub mod http_client;
pub mod http_handler;
pub mod memory_cache;
pub mod middleware;
pub mod redis_cache;
pub mod token_authority;

pub use health_checker::{HealthChecker, ServiceHealth};
pub use http_client::HttpClientAdapter;
pub use http_handler::{AppState, build_router};
pub use memory_cache::MemoryCacheStore;
pub use middleware::*;
pub use redis_cache::RedisCacheStore;
pub use token_authority::HttpTokenAuthority;
