//! Credentials attached to forwarded calls.
//!
//! The gateway never validates credentials; it only carries them on the
//! outbound request. The handler types exist for modules that mint a
//! credential once at startup and attach it to selected routes.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::registry::ModuleRegistry;

/// Opaque Basic/Bearer auth data attached to an outbound call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthCredential {
    Basic { username: String, password: String },
    Bearer { token: String },
}

// Secrets stay out of logs and error chains.
impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => {
                f.debug_struct("Bearer").field("token", &"<redacted>").finish()
            }
        }
    }
}

/// Mints Basic credentials on behalf of a registered module.
pub struct BasicAuthenticationHandler {
    module: String,
    username: String,
    password: String,
}

impl BasicAuthenticationHandler {
    /// The module id is resolved to its display name through the registry so
    /// log lines carry the human-readable module name.
    pub fn new(
        registry: &ModuleRegistry,
        module_id: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let module = registry
            .display_name(module_id)
            .unwrap_or(module_id)
            .to_string();
        tracing::info!(module = %module, "registered basic authentication handler");
        Self {
            module,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn credential(&self) -> AuthCredential {
        AuthCredential::Basic {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Mints Bearer credentials on behalf of a registered module.
pub struct BearerAuthenticationHandler {
    module: String,
    token: String,
}

impl BearerAuthenticationHandler {
    pub fn new(registry: &ModuleRegistry, module_id: &str, token: impl Into<String>) -> Self {
        let module = registry
            .display_name(module_id)
            .unwrap_or(module_id)
            .to_string();
        tracing::info!(module = %module, "registered bearer authentication handler");
        Self {
            module,
            token: token.into(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn credential(&self) -> AuthCredential {
        AuthCredential::Bearer {
            token: self.token.clone(),
        }
    }
}
