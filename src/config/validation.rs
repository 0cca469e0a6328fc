use std::{collections::HashSet, net::SocketAddr};

use crate::{
    config::models::{GatewayConfig, ModuleConfig},
    core::definition::ValidationError as DefinitionError,
};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ConfigValidationError>;

/// Whole-file validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ConfigValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Module '{id}': {source}")]
    Module {
        id: String,
        source: DefinitionError,
    },

    #[error("Route conflict detected: {message}")]
    RouteConflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Gateway configuration validator
///
/// Runs every definition through the same eager construction checks the
/// registry applies at startup, so `validate` passing means registration
/// will succeed.
pub struct GatewayConfigValidator;

impl GatewayConfigValidator {
    /// Validate the entire gateway configuration
    pub fn validate(config: &GatewayConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_listen_address(&config.listen_addr) {
            errors.push(e);
        }

        if config.modules.is_empty() {
            errors.push(ConfigValidationError::MissingField {
                field: "modules".to_string(),
            });
        } else {
            for (id, module) in &config.modules {
                Self::validate_module(id, module, &mut errors);
            }
            errors.extend(Self::check_route_conflicts(config));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// Validate listen address format
    fn validate_listen_address(address: &str) -> ValidationResult<()> {
        if address.parse::<SocketAddr>().is_err() {
            return Err(ConfigValidationError::InvalidListenAddress {
                address: address.to_string(),
                reason: "Must be in format 'IP:PORT' (e.g., '0.0.0.0:8080')".to_string(),
            });
        }
        Ok(())
    }

    /// Validate a single module block by constructing its definitions
    fn validate_module(id: &str, module: &ModuleConfig, errors: &mut Vec<ConfigValidationError>) {
        if let Err(e) = module.proxy_definition() {
            errors.push(ConfigValidationError::Module {
                id: id.to_string(),
                source: e,
            });
        }
        for entry in &module.routes {
            if let Err(e) = entry.to_definition() {
                errors.push(ConfigValidationError::Module {
                    id: id.to_string(),
                    source: e,
                });
            }
        }
    }

    /// Two routes binding the same method on the same full path would abort
    /// router assembly at startup; report them here with a usable message.
    fn check_route_conflicts(config: &GatewayConfig) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for (id, module) in &config.modules {
            for entry in &module.routes {
                let full_path = format!("{}{}", module.endpoint, entry.path);
                let key = (entry.method.to_ascii_uppercase(), full_path.clone());
                if !seen.insert(key) {
                    errors.push(ConfigValidationError::RouteConflict {
                        message: format!(
                            "Duplicate route {} {} (module '{}')",
                            entry.method.to_ascii_uppercase(),
                            full_path,
                            id
                        ),
                    });
                }
            }
        }
        errors
    }

    /// Format multiple validation errors into a single message
    fn format_multiple_errors(errors: Vec<ConfigValidationError>) -> String {
        if errors.is_empty() {
            return "No errors".to_string();
        }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::RouteEntry;

    fn minimal_valid_config() -> GatewayConfig {
        let module: ModuleConfig = serde_json::from_str(
            r#"{
                "endpoint": "/proxy/test",
                "target_base": "https://api.example.com",
                "routes": [
                    {"path": "/item", "upstream_path": "/todos", "method": "GET"}
                ]
            }"#,
        )
        .unwrap();

        GatewayConfig {
            listen_addr: "0.0.0.0:8080".to_string(),
            modules: [("example".to_string(), module)].into_iter().collect(),
        }
    }

    #[test]
    fn validate_accepts_minimal_config() {
        assert!(GatewayConfigValidator::validate(&minimal_valid_config()).is_ok());
    }

    #[test]
    fn validate_rejects_bad_listen_address() {
        let mut config = minimal_valid_config();
        config.listen_addr = "not-an-address".to_string();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn validate_rejects_empty_module_map() {
        let mut config = minimal_valid_config();
        config.modules.clear();
        assert!(GatewayConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn validate_rejects_loopback_target() {
        let mut config = minimal_valid_config();
        config
            .modules
            .get_mut("example")
            .unwrap()
            .target_base = "http://localhost:9000".to_string();

        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("Loopback"));
    }

    #[test]
    fn validate_rejects_duplicate_route_bindings() {
        let mut config = minimal_valid_config();
        let duplicate: RouteEntry = serde_json::from_str(
            r#"{"path": "/item", "upstream_path": "/other", "method": "get"}"#,
        )
        .unwrap();
        config
            .modules
            .get_mut("example")
            .unwrap()
            .routes
            .push(duplicate);

        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate route"));
    }

    #[test]
    fn validate_aggregates_multiple_errors() {
        let mut config = minimal_valid_config();
        config.listen_addr = "bad".to_string();
        config
            .modules
            .get_mut("example")
            .unwrap()
            .endpoint = "no-slash".to_string();

        let err = GatewayConfigValidator::validate(&config).unwrap_err();
        assert!(err.to_string().contains("2 validation errors"));
    }
}
