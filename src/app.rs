//! Explicit wiring of the gateway from its configuration.
use std::{sync::Arc, time::Duration};

use axum::Router;
use eyre::{Result, WrapErr};

use crate::{
    adapters::{
        health_checker::HealthChecker,
        http_handler::{AppState, build_router},
        memory_cache::MemoryCacheStore,
        redis_cache::RedisCacheStore,
        token_authority::HttpTokenAuthority,
    },
    config::{loader::load_redis_config, models::GatewayConfig},
    core::{
        auth_gate::AuthGate, proxy::RerouteProxy, registry::ServicesRegistry,
        response_cache::ResponseCache, token_verifier::TokenVerifier,
    },
    ports::{cache_store::CacheStore, http_client::HttpClient, token_authority::TokenAuthority},
};

/// Redis when enabled, otherwise a process-local store.
pub fn build_cache_store(config: &GatewayConfig) -> Result<Arc<dyn CacheStore>> {
    if config.redis.enabled {
        let redis_config = load_redis_config()?;
        let store: Arc<dyn CacheStore> = Arc::new(
            RedisCacheStore::new(&redis_config).wrap_err("Failed to configure Redis")?,
        );
        Ok(store)
    } else {
        tracing::warn!(
            "Redis disabled; token and response caches are local to this process"
        );
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        Ok(store)
    }
}

/// Allow-list for the auth gate: configured paths plus each service's
/// public endpoints.
pub fn excluded_paths(config: &GatewayConfig, registry: &ServicesRegistry) -> Vec<String> {
    let mut paths = config.public_paths.clone();
    paths.extend(registry.public_paths());
    paths.sort();
    paths.dedup();
    paths
}

/// Assemble the router. The token authority is resolved from the registry
/// unless one is supplied.
pub fn build_gateway(
    config: &GatewayConfig,
    registry: Arc<ServicesRegistry>,
    cache_store: Arc<dyn CacheStore>,
    http_client: Arc<dyn HttpClient>,
    authority: Option<Arc<dyn TokenAuthority>>,
) -> Result<Router> {
    let authority: Arc<dyn TokenAuthority> = match authority {
        Some(authority) => authority,
        None => Arc::new(HttpTokenAuthority::from_registry(&registry, &config.auth)?),
    };

    let verifier = Arc::new(TokenVerifier::new(cache_store.clone(), authority).with_ttls(
        Duration::from_secs(config.auth.token_ttl_secs),
        Duration::from_secs(config.auth.blacklist_ttl_secs),
    ));
    let excluded = excluded_paths(config, &registry);
    tracing::info!(paths = ?excluded, "Auth gate allow-list");
    let gate = Arc::new(AuthGate::new(excluded, verifier));

    let proxy = Arc::new(
        RerouteProxy::new(registry.clone(), http_client.clone())
            .with_timeout(Duration::from_secs(config.proxy_timeout_secs)),
    );

    let response_cache = config.response_cache.enabled.then(|| {
        Arc::new(
            ResponseCache::new(cache_store.clone(), config.response_cache.hash_name.clone())
                .with_ttl(Duration::from_secs(config.response_cache.ttl_secs)),
        )
    });

    let health = Arc::new(HealthChecker::new(
        registry,
        http_client,
        config.health_timeout_secs,
    ));

    let state = AppState {
        proxy,
        response_cache,
        cache_store,
        health,
    };
    Ok(build_router(state, gate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::ServiceConfig;

    #[test]
    fn test_excluded_paths_merge_registry() {
        let registry = ServicesRegistry::new([ServiceConfig::builder(
            "currency_service",
            "http://currency:8000",
        )
        .public_endpoint("rates/latest")
        .build()]);

        let paths = excluded_paths(&GatewayConfig::default(), &registry);
        assert!(paths.contains(&"/currency_service/rates/latest".to_string()));
        assert!(paths.contains(&"/users_service/login".to_string()));
        assert!(!paths.contains(&"/currency_service/rates".to_string()));
    }

    #[test]
    fn test_missing_authority_fails_wiring() {
        let registry = Arc::new(ServicesRegistry::new([ServiceConfig::builder(
            "currency_service",
            "http://currency:8000",
        )
        .build()]));

        let result = build_gateway(
            &GatewayConfig::default(),
            registry,
            Arc::new(MemoryCacheStore::new()),
            Arc::new(crate::adapters::http_client::HttpClientAdapter::new().unwrap()),
            None,
        );
        assert!(result.is_err());
    }
}
