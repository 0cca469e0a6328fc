//! Portico - a pluggable HTTP reverse-proxy gateway.
//!
//! Portico forwards requests arriving on locally-defined routes to remote
//! target services. Each **proxy module** owns one mount point (a
//! [`ProxyDefinition`]) and registers any number of forwarded routes
//! ([`RouteDefinition`]) against the factory bound to it; every registration
//! yields one live route on the host router.
//!
//! # Features
//! - Dynamic route registration with `{name}` path templates substituted
//!   into the upstream path
//! - Case-insensitive header block-lists per mount point
//! - Static query parameters (comma-merged with inbound duplicates), static
//!   bodies (shallow-merged over inbound JSON objects) and static headers
//! - Pluggable request/response transform hooks and an injectable payload
//!   transform capability for raw bodies
//! - Basic/Bearer credential injection on outbound calls (never validated
//!   locally)
//! - Forwarding-error translation into a structured JSON error payload
//! - Eager, construction-time validation of every definition
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use portico::{
//!     ModuleDescriptor, ModuleRegistry, ProxyDefinition, ReqwestForwarder, RouteDefinition,
//! };
//!
//! # fn main() -> eyre::Result<()> {
//! let mut registry = ModuleRegistry::new(Arc::new(ReqwestForwarder::new()));
//! let factory = registry.register(
//!     ModuleDescriptor::new("example", "Example Module", "Forwards to the example API"),
//!     ProxyDefinition::new("/proxy/example", "https://api.example.com", None)?,
//! )?;
//! factory.register(
//!     RouteDefinition::builder("/item/{id}", "/todos/{id}", "GET")
//!         .path_params(["id"])
//!         .build()?,
//! );
//! let app: axum::Router = registry.into_router();
//! // Serve `app` with axum (see the binary crate).
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters**
//! (implementations) while keeping business logic inside `core`. The only
//! port is [`RequestForwarder`], the outbound HTTP seam; tests replace it
//! with an in-memory double, production wires in [`ReqwestForwarder`].
//!
//! # Error Handling
//! Construction-time failures are `ValidationError` values and abort module
//! registration. Request-time failures never escape the handler boundary:
//! they are rendered as `{"error": ..., "status": "failed"}` JSON payloads
//! with a status class per failure kind.
pub mod config;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;
pub mod ports;

// Re-export the types most embedders need
pub use crate::{
    adapters::ReqwestForwarder,
    core::{
        DEFAULT_TIMEOUT_SECS, HandlerError, Method, ModuleDescriptor, ModuleRegistry,
        ProxyDefinition, ProxyModule, QueryValue, RegistryEntry, RouteDefinition,
        RouteDefinitionBuilder, RouteHandlerFactory, ValidationError,
        auth::AuthCredential,
        payload::{IdentityTransform, Payload, PayloadTransform, TransformHook},
        register_modules,
    },
    ports::forwarder::{ForwardError, ForwardResult, OutboundRequest, RawResponse, RequestForwarder},
};
