//! Configuration data structures for Portico.
//!
//! These types map directly to YAML (also JSON / TOML) configuration files.
//! They are intentionally serde-friendly and include defaults so that
//! minimal configs remain concise. Hooks are functions and cannot be
//! declared here, so configuration-driven modules register hook-less
//! routes; anything needing hooks implements [`ProxyModule`] in code.
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::core::{
    auth::AuthCredential,
    definition::{
        DEFAULT_TIMEOUT_SECS, ProxyDefinition, QueryValue, RouteDefinition, ValidationError,
    },
    factory::RouteHandlerFactory,
    registry::{ModuleDescriptor, ProxyModule},
};

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Top-level gateway configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Address the gateway listens on, in `IP:PORT` form
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Proxy modules keyed by module id
    #[serde(default)]
    pub modules: HashMap<String, ModuleConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            modules: HashMap::new(),
        }
    }
}

/// One configuration-declared proxy module.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModuleConfig {
    /// Display name; defaults to the module id
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Local path prefix all of this module's routes mount under
    pub endpoint: String,
    /// Upstream base address, an absolute non-loopback HTTP(S) URL
    pub target_base: String,
    /// Header names stripped from every inbound request before forwarding
    #[serde(default)]
    pub excluded_headers: Option<HashSet<String>>,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

impl ModuleConfig {
    pub fn proxy_definition(&self) -> Result<ProxyDefinition, ValidationError> {
        ProxyDefinition::new(
            self.endpoint.clone(),
            &self.target_base,
            self.excluded_headers.clone(),
        )
    }
}

/// One forwarded route inside a module block.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RouteEntry {
    /// Path exposed on the gateway, relative to the module endpoint; may
    /// contain `{name}` placeholders
    pub path: String,
    /// Path appended to the module's target base
    pub upstream_path: String,
    pub method: String,
    #[serde(default)]
    pub path_params: Vec<String>,
    #[serde(default)]
    pub query_params: BTreeMap<String, QueryValue>,
    #[serde(default)]
    pub static_body: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub auth: Option<AuthCredential>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RouteEntry {
    pub fn to_definition(&self) -> Result<RouteDefinition, ValidationError> {
        let mut builder =
            RouteDefinition::builder(self.path.clone(), self.upstream_path.clone(), self.method.as_str())
                .path_params(self.path_params.clone())
                .timeout_secs(self.timeout_seconds);
        for (key, value) in &self.query_params {
            builder = builder.query_param(key.clone(), value.clone());
        }
        if let Some(body) = &self.static_body {
            builder = builder.static_body(body.clone());
        }
        for (name, value) in &self.headers {
            builder = builder.header(name.clone(), value.clone());
        }
        if let Some(auth) = &self.auth {
            builder = builder.auth(auth.clone());
        }
        if let Some(name) = &self.name {
            builder = builder.name(name.clone());
        }
        for tag in &self.tags {
            builder = builder.tag(tag.clone());
        }
        builder.build()
    }
}

/// Adapts one configuration-declared module to the [`ProxyModule`] contract.
pub struct ConfigModule {
    id: String,
    config: ModuleConfig,
}

impl ConfigModule {
    pub fn new(id: impl Into<String>, config: ModuleConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }
}

impl ProxyModule for ConfigModule {
    fn descriptor(&self) -> ModuleDescriptor {
        let display_name = self.config.name.clone().unwrap_or_else(|| self.id.clone());
        ModuleDescriptor::new(self.id.clone(), display_name, self.config.description.clone())
    }

    fn proxy_definition(&self) -> Result<ProxyDefinition, ValidationError> {
        self.config.proxy_definition()
    }

    fn register_routes(&self, factory: &RouteHandlerFactory) -> Result<(), ValidationError> {
        for entry in &self.config.routes {
            factory.register(entry.to_definition()?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::definition::Method;

    fn route_entry(json: &str) -> RouteEntry {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn route_entry_maps_onto_a_definition() {
        let entry = route_entry(
            r#"{
                "path": "/item/{id}",
                "upstream_path": "/todos/{id}",
                "method": "get",
                "path_params": ["id"],
                "query_params": {"expand": "all", "limit": 10},
                "headers": {"x-forwarded-module": "example"},
                "timeout_seconds": 5
            }"#,
        );

        let route = entry.to_definition().unwrap();
        assert_eq!(route.method(), Method::Get);
        assert_eq!(route.timeout(), std::time::Duration::from_secs(5));
        assert_eq!(route.query_params().get("limit"), Some(&QueryValue::Int(10)));
        assert!(route.static_headers().contains_key("x-forwarded-module"));
    }

    #[test]
    fn timeout_defaults_to_thirty_seconds() {
        let entry =
            route_entry(r#"{"path": "/item", "upstream_path": "/todos", "method": "GET"}"#);
        assert_eq!(entry.timeout_seconds, 30);
    }

    #[test]
    fn static_body_and_auth_carry_through() {
        let entry = route_entry(
            r#"{
                "path": "/post",
                "upstream_path": "/posts",
                "method": "POST",
                "static_body": {"title": "test", "body": "test", "userId": 1},
                "auth": {"type": "bearer", "token": "t"}
            }"#,
        );

        let route = entry.to_definition().unwrap();
        assert_eq!(
            route.static_body(),
            Some(&json!({"title": "test", "body": "test", "userId": 1}))
        );
        assert_eq!(
            route.auth(),
            Some(&AuthCredential::Bearer { token: "t".to_string() })
        );
    }

    #[test]
    fn invalid_method_in_config_fails_definition_building() {
        let entry =
            route_entry(r#"{"path": "/item", "upstream_path": "/todos", "method": "TRACE"}"#);
        assert!(matches!(
            entry.to_definition().unwrap_err(),
            ValidationError::InvalidMethod { .. }
        ));
    }
}
