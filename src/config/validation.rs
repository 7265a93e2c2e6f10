use std::{collections::HashMap, net::SocketAddr};

use crate::config::models::{GatewayConfig, ServiceConfig};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Checks a gateway configuration together with the services registry it
/// will be started with.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the gateway config and services map, collecting every error.
    pub fn validate(
        config: &GatewayConfig,
        services: &HashMap<String, ServiceConfig>,
    ) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if services.is_empty() {
            errors.push(ValidationError::MissingField {
                field: "services".to_string(),
            });
        }

        for (name, service) in services {
            if let Err(mut service_errors) = Self::validate_service(name, service) {
                errors.append(&mut service_errors);
            }
        }

        let authority = config.auth.authority_service.to_lowercase();
        if !services.keys().any(|name| name.to_lowercase() == authority) {
            errors.push(ValidationError::InvalidField {
                field: "auth.authority_service".to_string(),
                message: format!(
                    "Token authority '{}' is not a registered service",
                    config.auth.authority_service
                ),
            });
        }

        if !config.auth.verify_path.starts_with('/') {
            errors.push(ValidationError::InvalidField {
                field: "auth.verify_path".to_string(),
                message: "Must start with '/'".to_string(),
            });
        }

        for (field, value) in [
            ("proxy_timeout_secs", config.proxy_timeout_secs),
            ("health_timeout_secs", config.health_timeout_secs),
            ("auth.token_ttl_secs", config.auth.token_ttl_secs),
            ("auth.blacklist_ttl_secs", config.auth.blacklist_ttl_secs),
            ("auth.verify_timeout_secs", config.auth.verify_timeout_secs),
            ("response_cache.ttl_secs", config.response_cache.ttl_secs),
        ] {
            if value == 0 {
                errors.push(ValidationError::InvalidField {
                    field: field.to_string(),
                    message: "Must be greater than zero".to_string(),
                });
            }
        }

        if config.response_cache.enabled && config.response_cache.hash_name.contains(':') {
            errors.push(ValidationError::InvalidField {
                field: "response_cache.hash_name".to_string(),
                message: "Must not contain ':'".to_string(),
            });
        }

        for path in &config.public_paths {
            if !path.starts_with('/') {
                errors.push(ValidationError::InvalidField {
                    field: format!("public_paths: {path}"),
                    message: "Public paths must start with '/'".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '127.0.0.1:3000' or '0.0.0.0:8080')"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn validate_service(name: &str, service: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if name.contains('/') || name.is_empty() {
            errors.push(ValidationError::InvalidField {
                field: format!("service name: {name}"),
                message: "Service names must be a single, non-empty path segment".to_string(),
            });
        }

        if let Err(e) = Self::validate_url(&service.base_url, &format!("service '{name}' base_url"))
        {
            errors.push(e);
        } else if service.base_url.ends_with('/') {
            errors.push(ValidationError::InvalidField {
                field: format!("service '{name}' base_url"),
                message: "Must not end with '/'".to_string(),
            });
        }

        if !service.prefix.is_empty()
            && (!service.prefix.starts_with('/') || service.prefix.ends_with('/'))
        {
            errors.push(ValidationError::InvalidField {
                field: format!("service '{name}' prefix"),
                message: "Prefix must be empty or start with '/' and not end with '/'"
                    .to_string(),
            });
        }

        if let Some(path) = &service.health_check {
            if !path.starts_with('/') {
                errors.push(ValidationError::InvalidField {
                    field: format!("service '{name}' health_check"),
                    message: "Health check path must start with '/'".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate URL format
    fn validate_url(url_str: &str, context: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host().is_none() {
                    return Err(ValidationError::InvalidField {
                        field: context.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: context.to_string(),
                message: format!("Invalid URL format: {e}"),
            }),
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        if errors.len() == 1 {
            return errors[0].to_string();
        }

        let mut message = format!("Found {} validation errors:\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}
