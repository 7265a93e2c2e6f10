//! Conduit - an authenticating reroute gateway.
//!
//! Conduit sits in front of a set of named backend services and forwards
//! `/{service}/{path}` to `base_url + prefix + "/" + path` of the service
//! registered under that name. Every request passes an auth gate first:
//! bearer tokens are checked against a distributed cache (`jwt:<sha256>` for
//! known-good tokens, `black_list_jwt:<sha256>` for revoked ones) and only
//! verified remotely by the token authority on a cache miss.
//!
//! # Features
//! - Exact-match allow-list for public paths
//! - Token validity cache with blacklist precedence and bounded staleness
//! - Transparent proxying of method, headers, query and body
//! - Optional GET response cache keyed by service, path and query
//! - Service health aggregation on `/health`
//! - Structured tracing via `tracing` and metrics via the `metrics` facade
//!
//! # Architecture
//! **Ports** (traits: [`ports::CacheStore`], [`ports::TokenAuthority`],
//! [`ports::HttpClient`]) are implemented by **adapters** (Redis, in-memory,
//! reqwest, hyper). Request logic lives in `core` and only depends on ports.
//! [`app::build_gateway`] wires everything together explicitly.
//!
//! # Error Handling
//! Per-request failures are [`error::GatewayError`] values rendered as
//! `{"message": ...}` JSON. Startup paths return `eyre::Result<T>` with
//! `WrapErr` context.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use conduit::{
//!     adapters::HttpClientAdapter, app, config::load_config, core::ServicesRegistry,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = load_config("conduit.toml").await?;
//! let registry = Arc::new(ServicesRegistry::from_json_file(&config.services_file)?);
//! let router = app::build_gateway(
//!     &config,
//!     registry,
//!     app::build_cache_store(&config)?,
//!     Arc::new(HttpClientAdapter::new()?),
//!     None,
//! )?;
//! let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
//! axum::serve(listener, router).await?;
//! # Ok(()) }
//! ```
pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod error;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub use crate::{
    adapters::{HttpClientAdapter, MemoryCacheStore, RedisCacheStore},
    core::{AuthGate, RerouteProxy, ResponseCache, ServicesRegistry, TokenVerifier},
    error::GatewayError,
    ports::{CacheStore, HttpClient, TokenAuthority},
    utils::GracefulShutdown,
};
