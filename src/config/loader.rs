use std::{collections::HashMap, path::Path};

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::{GatewayConfig, RedisConfig, ServiceConfig};

/// Environment prefix for gateway overrides, e.g. `CONDUIT__LISTEN_ADDR`.
pub const ENV_PREFIX: &str = "CONDUIT";

fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml,
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))
}

/// Load the gateway configuration.
///
/// The file is optional; `CONDUIT__*` environment variables are layered on
/// top and serde defaults fill whatever neither source sets.
pub async fn load_config(config_path: &str) -> Result<GatewayConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<GatewayConfig> {
    let path = Path::new(config_path);

    let settings = Config::builder()
        .add_source(File::new(path_str(path)?, file_format(path)).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("public_paths")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to build config from {}", path.display()))?;

    settings
        .try_deserialize::<GatewayConfig>()
        .with_context(|| format!("Failed to deserialize config from {}", path.display()))
}

/// Load the services registry file (`name -> {base_url, prefix, ...}`).
///
/// Unlike the gateway config, the file is mandatory.
pub fn load_services(services_path: &str) -> Result<HashMap<String, ServiceConfig>> {
    let path = Path::new(services_path);
    if !path.is_file() {
        eyre::bail!("Services file not found: {}", path.display());
    }

    let settings = Config::builder()
        .add_source(File::new(path_str(path)?, file_format(path)))
        .build()
        .with_context(|| format!("Failed to read services from {}", path.display()))?;

    let mut services: HashMap<String, ServiceConfig> = settings
        .try_deserialize()
        .with_context(|| format!("Failed to deserialize services from {}", path.display()))?;

    for (name, service) in services.iter_mut() {
        service.name = name.clone();
    }
    Ok(services)
}

/// Read Redis connection parameters from the process environment.
pub fn load_redis_config() -> Result<RedisConfig> {
    redis_config_from(None)
}

/// Read Redis connection parameters from `source`, or from the process
/// environment when `source` is `None`.
pub fn redis_config_from(source: Option<HashMap<String, String>>) -> Result<RedisConfig> {
    Config::builder()
        .add_source(
            Environment::with_prefix("REDIS")
                .try_parsing(true)
                .source(source),
        )
        .build()
        .context("Failed to read Redis environment")?
        .try_deserialize()
        .context("Failed to deserialize Redis environment")
}
