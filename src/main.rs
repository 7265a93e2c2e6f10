use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use conduit::{
    adapters::HttpClientAdapter,
    app,
    config::{ConfigValidator, GatewayConfig, load_config, load_services},
    core::ServicesRegistry,
    metrics,
    ports::http_client::HttpClient,
    tracing_setup::{self, LogFormat},
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Gateway configuration file (optional; CONDUIT__* env overrides it)
    #[clap(short, long, default_value = "conduit.toml", global = true)]
    config: String,

    #[clap(long, value_enum, default_value_t = LogFormat::Json, global = true)]
    log_format: LogFormat,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate the gateway configuration and services file
    Validate,
    /// Write a starter gateway configuration and services file
    Init {
        /// Output path for the services file
        #[clap(short, long, default_value = "config.json")]
        services: String,
    },
    /// Start the gateway server (default)
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Validate => validate_config_command(&args.config).await,
        Commands::Init { services } => init_config_command(&args.config, &services).await,
        Commands::Serve => serve(&args.config, args.log_format).await,
    }
}

async fn serve(config_path: &str, log_format: LogFormat) -> Result<()> {
    tracing_setup::init_tracing(log_format, "info")
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;
    metrics::init_metrics().map_err(|e| eyre!("Failed to initialize metrics: {}", e))?;

    tracing::info!("Loading configuration from {config_path}");
    let config = load_config(config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    let services = load_services(&config.services_file)
        .with_context(|| format!("Failed to load services from {}", config.services_file))?;
    ConfigValidator::validate(&config, &services)
        .map_err(|e| eyre!("Invalid configuration: {}", e))?;

    let registry = Arc::new(ServicesRegistry::new(services.into_values()));
    tracing::info!(services = ?registry.names(), "Services registry loaded");

    let cache_store = app::build_cache_store(&config)?;
    let http_client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client adapter")?);
    let router = app::build_gateway(&config, registry, cache_store, http_client, None)
        .context("Failed to assemble gateway")?;

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_handler_shutdown.run_signal_handler().await;
    });

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!("Conduit listening on {}", config.listen_addr);

    let server_shutdown = graceful_shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            server_shutdown.wait_for_shutdown_signal().await;
        })
        .await
        .context("Server error")?;

    tracing::info!("Conduit stopped");
    Ok(())
}

/// Validate configuration and services file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration: {config_path}");

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    let services = match load_services(&config.services_file) {
        Ok(services) => {
            println!("✅ Services file parsing: OK ({})", config.services_file);
            services
        }
        Err(e) => {
            eprintln!("❌ Services file parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    match ConfigValidator::validate(&config, &services) {
        Ok(()) => {
            let mut names: Vec<_> = services.keys().cloned().collect();
            names.sort();
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Services: {}", names.join(", "));
            println!("   • Token Authority: {}", config.auth.authority_service);
            println!("   • Public Paths: {}", config.public_paths.len());
            println!("   • Response Cache: {}", config.response_cache.enabled);
            println!("   • Redis: {}", config.redis.enabled);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure base_url values start with http:// or https:// and have no trailing '/'");
            println!("   • Prefixes and health_check paths must start with '/'");
            println!("   • auth.authority_service must name a registered service");
            std::process::exit(1);
        }
    }
}

const DEFAULT_SERVICES: &str = r#"{
  "currency_service": {
    "base_url": "http://currency_service:8000",
    "prefix": "/api/v1",
    "health_check": "/health"
  },
  "users_service": {
    "base_url": "http://users_service:8000",
    "prefix": "/api/v1",
    "health_check": "/health",
    "public_endpoints": ["login", "registration"]
  }
}
"#;

/// Write starter files, refusing to overwrite existing ones.
async fn init_config_command(config_path: &str, services_path: &str) -> Result<()> {
    for path in [config_path, services_path] {
        if Path::new(path).exists() {
            eprintln!("❌ Error: '{path}' already exists");
            std::process::exit(1);
        }
    }

    let mut config = GatewayConfig::default();
    config.services_file = services_path.to_string();
    let rendered = match Path::new(config_path).extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::to_string_pretty(&config)?,
        _ => render_toml(&config),
    };

    tokio::fs::write(config_path, rendered)
        .await
        .context("Failed to write config file")?;
    tokio::fs::write(services_path, DEFAULT_SERVICES)
        .await
        .context("Failed to write services file")?;

    println!("✅ Created {config_path} and {services_path}");
    println!("   Run 'conduit serve --config {config_path}' to start the gateway");
    Ok(())
}

fn render_toml(config: &GatewayConfig) -> String {
    let public_paths = config
        .public_paths
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"# Conduit gateway configuration
# Any key can be overridden from the environment, e.g. CONDUIT__LISTEN_ADDR

listen_addr = "{listen_addr}"
services_file = "{services_file}"
public_paths = [{public_paths}]
proxy_timeout_secs = {proxy_timeout}
health_timeout_secs = {health_timeout}

[auth]
authority_service = "{authority}"
verify_path = "{verify_path}"
token_ttl_secs = {token_ttl}
blacklist_ttl_secs = {blacklist_ttl}
verify_timeout_secs = {verify_timeout}

[response_cache]
enabled = {cache_enabled}
hash_name = "{hash_name}"
ttl_secs = {cache_ttl}

# Connection parameters come from REDIS_HOST, REDIS_PORT, REDIS_DB,
# REDIS_PASSWORD, REDIS_DEFAULT_TTL and REDIS_TIMEOUT_MS
[redis]
enabled = {redis_enabled}
"#,
        listen_addr = config.listen_addr,
        services_file = config.services_file,
        proxy_timeout = config.proxy_timeout_secs,
        health_timeout = config.health_timeout_secs,
        authority = config.auth.authority_service,
        verify_path = config.auth.verify_path,
        token_ttl = config.auth.token_ttl_secs,
        blacklist_ttl = config.auth.blacklist_ttl_secs,
        verify_timeout = config.auth.verify_timeout_secs,
        cache_enabled = config.response_cache.enabled,
        hash_name = config.response_cache.hash_name,
        cache_ttl = config.response_cache.ttl_secs,
        redis_enabled = config.redis.enabled,
    )
}
