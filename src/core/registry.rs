//! Module registration and lookup.
//!
//! The registry is created once at startup, populated by explicit
//! registration calls before the listener starts, and shared read-only
//! afterwards. It owns one [`RouteHandlerFactory`] per module and the
//! metadata cross-module collaborators look up (an authentication helper
//! resolving another module's display name, for instance).
use std::{collections::HashMap, sync::Arc};

use axum::Router;

use crate::{
    core::{
        definition::{ProxyDefinition, ValidationError},
        factory::RouteHandlerFactory,
        payload::{IdentityTransform, PayloadTransform},
    },
    ports::forwarder::RequestForwarder,
};

/// Identity and human-readable metadata for one proxy module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub display_name: String,
    pub description: String,
}

impl ModuleDescriptor {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
        }
    }
}

/// One registered module: its metadata and its bound factory.
pub struct RegistryEntry {
    descriptor: ModuleDescriptor,
    factory: Arc<RouteHandlerFactory>,
}

impl RegistryEntry {
    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn factory(&self) -> &Arc<RouteHandlerFactory> {
        &self.factory
    }
}

/// Process-wide mapping from module id to its factory and metadata.
pub struct ModuleRegistry {
    forwarder: Arc<dyn RequestForwarder>,
    payload_transform: Arc<dyn PayloadTransform>,
    entries: HashMap<String, RegistryEntry>,
}

impl ModuleRegistry {
    pub fn new(forwarder: Arc<dyn RequestForwarder>) -> Self {
        Self::with_payload_transform(forwarder, Arc::new(IdentityTransform))
    }

    /// Create a registry whose factories apply a non-default payload
    /// transform capability to raw request bodies.
    pub fn with_payload_transform(
        forwarder: Arc<dyn RequestForwarder>,
        payload_transform: Arc<dyn PayloadTransform>,
    ) -> Self {
        Self {
            forwarder,
            payload_transform,
            entries: HashMap::new(),
        }
    }

    /// Register a module and obtain the factory bound to its mount point.
    ///
    /// A duplicate id is rejected; silently replacing a live mount point is
    /// a misconfiguration, not an update mechanism.
    pub fn register(
        &mut self,
        descriptor: ModuleDescriptor,
        proxy: ProxyDefinition,
    ) -> Result<Arc<RouteHandlerFactory>, ValidationError> {
        if self.entries.contains_key(&descriptor.id) {
            return Err(ValidationError::DuplicateModule {
                id: descriptor.id.clone(),
            });
        }

        let factory = Arc::new(RouteHandlerFactory::new(
            proxy,
            Arc::clone(&self.forwarder),
            Arc::clone(&self.payload_transform),
        ));
        tracing::info!(
            module = %descriptor.id,
            name = %descriptor.display_name,
            endpoint = %factory.proxy().endpoint(),
            "registered proxy module"
        );
        self.entries.insert(
            descriptor.id.clone(),
            RegistryEntry {
                descriptor,
                factory: Arc::clone(&factory),
            },
        );
        Ok(factory)
    }

    pub fn lookup(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.entries
            .get(id)
            .map(|entry| entry.descriptor.display_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge every module's accumulated routes into one application router.
    pub fn into_router(self) -> Router {
        self.entries
            .into_values()
            .fold(Router::new(), |router, entry| {
                router.merge(entry.factory.take_router())
            })
    }
}

/// A unit owning one mount point and a set of forwarded routes.
///
/// Modules are registered by an explicit startup call, never discovered by
/// scanning the filesystem; configuration-declared modules are adapted
/// through [`ConfigModule`](crate::config::models::ConfigModule), while
/// modules needing transform hooks implement this trait directly.
pub trait ProxyModule: Send + Sync {
    fn descriptor(&self) -> ModuleDescriptor;

    fn proxy_definition(&self) -> Result<ProxyDefinition, ValidationError>;

    /// Register this module's routes against its bound factory.
    fn register_routes(&self, factory: &RouteHandlerFactory) -> Result<(), ValidationError>;
}

/// Register every module in order; the first validation failure aborts
/// startup so a misconfigured route is never exposed.
pub fn register_modules(
    registry: &mut ModuleRegistry,
    modules: &[Box<dyn ProxyModule>],
) -> Result<(), ValidationError> {
    for module in modules {
        let factory = registry.register(module.descriptor(), module.proxy_definition()?)?;
        module.register_routes(&factory)?;
    }
    Ok(())
}
