pub mod auth;
pub mod definition;
pub mod factory;
pub mod headers;
pub mod payload;
pub mod pipeline;
pub mod registry;

pub use definition::{
    DEFAULT_TIMEOUT_SECS, Method, ProxyDefinition, QueryValue, RouteDefinition,
    RouteDefinitionBuilder, ValidationError,
};
pub use factory::{HandlerError, RouteHandlerFactory};
pub use registry::{
    ModuleDescriptor, ModuleRegistry, ProxyModule, RegistryEntry, register_modules,
};
