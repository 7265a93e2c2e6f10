use std::{collections::BTreeMap, sync::Arc};

use futures_util::future::join_all;
use serde::Serialize;

use crate::{core::registry::ServicesRegistry, metrics, ports::http_client::HttpClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    Healthy,
    Unhealthy,
    /// No `health_check` path configured
    Unchecked,
}

impl ServiceHealth {
    pub fn is_ok(&self) -> bool {
        !matches!(self, ServiceHealth::Unhealthy)
    }
}

/// On-demand health probes of every registered service.
///
/// Each service with a `health_check` path gets a `HEAD` to
/// `base_url + prefix + health_check`; probes run concurrently and each is
/// bounded by `timeout_secs`.
pub struct HealthChecker {
    registry: Arc<ServicesRegistry>,
    http_client: Arc<dyn HttpClient>,
    timeout_secs: u64,
}

impl HealthChecker {
    pub fn new(
        registry: Arc<ServicesRegistry>,
        http_client: Arc<dyn HttpClient>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            http_client,
            timeout_secs,
        }
    }

    pub async fn check_services(&self) -> BTreeMap<String, ServiceHealth> {
        let probes = self.registry.iter().map(|service| async move {
            let Some(path) = service.health_check.as_deref() else {
                return (service.name.clone(), ServiceHealth::Unchecked);
            };

            let url = format!("{}{}", service.root_url(), path);
            let healthy = match self.http_client.health_check(&url, self.timeout_secs).await {
                Ok(healthy) => healthy,
                Err(err) => {
                    tracing::warn!(service = %service.name, url = %url, error = %err, "Health check failed");
                    false
                }
            };

            metrics::set_service_health_status(&service.name, healthy);
            let health = if healthy {
                ServiceHealth::Healthy
            } else {
                ServiceHealth::Unhealthy
            };
            (service.name.clone(), health)
        });

        join_all(probes).await.into_iter().collect()
    }
}
