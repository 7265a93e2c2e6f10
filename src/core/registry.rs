//! Read-only registry of backend services.
//!
//! Built once at startup from the services file and shared behind an `Arc`.
//! Lookups are case-insensitive; an unknown name is always an error.
use std::collections::HashMap;

use eyre::Result;
use thiserror::Error;

use crate::config::{loader, models::ServiceConfig};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("Unknown service: {0}")]
    UnknownService(String),
}

#[derive(Debug, Clone, Default)]
pub struct ServicesRegistry {
    services: HashMap<String, ServiceConfig>,
}

impl ServicesRegistry {
    pub fn new(services: impl IntoIterator<Item = ServiceConfig>) -> Self {
        let services = services
            .into_iter()
            .map(|svc| (svc.name.to_lowercase(), svc))
            .collect();
        Self { services }
    }

    /// Load the registry from a JSON (or TOML / YAML) services file.
    pub fn from_json_file(path: &str) -> Result<Self> {
        let services = loader::load_services(path)?;
        Ok(Self::new(services.into_values()))
    }

    pub fn get(&self, name: &str) -> Result<&ServiceConfig, RegistryError> {
        self.services
            .get(&name.to_lowercase())
            .ok_or_else(|| RegistryError::UnknownService(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.services.values()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.values().map(|s| s.name.clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Gateway paths declared public by the services themselves:
    /// `/<service>/<endpoint>` for every entry of `public_endpoints`.
    pub fn public_paths(&self) -> Vec<String> {
        self.services
            .values()
            .flat_map(|svc| {
                svc.public_endpoints
                    .iter()
                    .map(move |ep| format!("/{}/{}", svc.name, ep.trim_start_matches('/')))
            })
            .collect()
    }
}
