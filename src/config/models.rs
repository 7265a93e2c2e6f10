//! Configuration data structures for Conduit.
//!
//! `GatewayConfig` maps to the gateway's own config file (TOML / YAML / JSON),
//! `ServiceConfig` to one entry of the services registry file, and
//! `RedisConfig` to the `REDIS_*` environment. Every field has a serde default
//! so an empty source still yields a runnable configuration.
use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_services_file() -> String {
    "config.json".to_string()
}

/// Exact-match paths that bypass authentication.
pub fn default_public_paths() -> Vec<String> {
    [
        "/",
        "/docs",
        "/redoc",
        "/openapi.json",
        "/users_service/login",
        "/users_service/registration",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_proxy_timeout_secs() -> u64 {
    10
}

fn default_health_timeout_secs() -> u64 {
    2
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Path of the JSON services registry
    #[serde(default = "default_services_file")]
    pub services_file: String,
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
    #[serde(default = "default_proxy_timeout_secs")]
    pub proxy_timeout_secs: u64,
    /// Timeout for each service health probe
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub response_cache: ResponseCacheConfig,
    #[serde(default)]
    pub redis: RedisToggle,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            services_file: default_services_file(),
            public_paths: default_public_paths(),
            proxy_timeout_secs: default_proxy_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
            auth: AuthConfig::default(),
            response_cache: ResponseCacheConfig::default(),
            redis: RedisToggle::default(),
        }
    }
}

/// Token verification settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    /// Registry name of the service that verifies tokens
    pub authority_service: String,
    /// Path appended to the authority's base URL and prefix
    pub verify_path: String,
    /// How long a verified token stays trusted without re-verification
    pub token_ttl_secs: u64,
    /// How long a revoked token stays on the blacklist
    pub blacklist_ttl_secs: u64,
    pub verify_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            authority_service: "users_service".to_string(),
            verify_path: "/verify_token".to_string(),
            token_ttl_secs: 60,
            blacklist_ttl_secs: 300,
            verify_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ResponseCacheConfig {
    pub enabled: bool,
    /// Namespace prepended to every response cache key
    pub hash_name: String,
    pub ttl_secs: u64,
}

impl Default for ResponseCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hash_name: "gateway".to_string(),
            ttl_secs: 30,
        }
    }
}

/// Whether the gateway talks to Redis at all. Connection parameters come
/// from the environment, see [`RedisConfig`].
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RedisToggle {
    pub enabled: bool,
}

impl Default for RedisToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Redis connection parameters (`REDIS_HOST`, `REDIS_PORT`, `REDIS_DB`,
/// `REDIS_PASSWORD`, `REDIS_DEFAULT_TTL`, `REDIS_TIMEOUT_MS`).
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: Option<String>,
    /// TTL applied to `set` calls that carry none; `None` stores permanently
    pub default_ttl: Option<u64>,
    /// Upper bound for every single cache round trip
    pub timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: None,
            default_ttl: None,
            timeout_ms: 250,
        }
    }
}

impl RedisConfig {
    /// Build a `redis://` connection URL.
    pub fn connection_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => format!(
                "redis://:{password}@{}:{}/{}",
                self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// One entry of the services registry file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Registry key; filled in from the map key when loading
    #[serde(default)]
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub health_check: Option<String>,
    #[serde(default)]
    pub public_endpoints: Vec<String>,
}

impl ServiceConfig {
    pub fn builder(name: impl Into<String>, base_url: impl Into<String>) -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            inner: ServiceConfig {
                name: name.into(),
                base_url: base_url.into(),
                prefix: String::new(),
                health_check: None,
                public_endpoints: Vec::new(),
            },
        }
    }

    /// `base_url + prefix`, the root every rerouted path is appended to.
    pub fn root_url(&self) -> String {
        format!("{}{}", self.base_url, self.prefix)
    }
}

/// Builder for [`ServiceConfig`], mostly convenient in tests and embedding.
pub struct ServiceConfigBuilder {
    inner: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.prefix = prefix.into();
        self
    }

    pub fn health_check(mut self, path: impl Into<String>) -> Self {
        self.inner.health_check = Some(path.into());
        self
    }

    pub fn public_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.inner.public_endpoints.push(endpoint.into());
        self
    }

    pub fn build(self) -> ServiceConfig {
        self.inner
    }
}
