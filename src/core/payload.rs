//! Payload values and transform hooks.
//!
//! Bodies flowing through the gateway are either parsed JSON or raw bytes;
//! [`Payload`] is the tagged form both hooks and the forwarder operate on.
use std::sync::Arc;

use bytes::Bytes;

/// A request or response body at a transform seam.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Bytes(Bytes),
}

impl Payload {
    /// Classify raw bytes: JSON when they parse, raw bytes otherwise.
    pub fn from_bytes(body: Bytes) -> Self {
        match serde_json::from_slice(&body) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Bytes(body),
        }
    }

    /// Serialize back to wire bytes. Raw payloads round-trip untouched.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Json(value) => Bytes::from(value.to_string()),
            Self::Bytes(bytes) => bytes,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Bytes(_) => None,
        }
    }
}

/// An optional pluggable function transforming a request or response
/// payload. Returning `Some` replaces the payload; `None` keeps it.
pub type TransformHook = Arc<dyn Fn(&Payload) -> Option<Payload> + Send + Sync>;

/// Apply an optional hook with the replace-or-keep rule.
pub fn apply_hook(hook: Option<&TransformHook>, payload: Payload) -> Payload {
    match hook {
        Some(hook) => hook(&payload).unwrap_or(payload),
        None => payload,
    }
}

/// External post-processing capability applied to non-JSON request bodies.
///
/// The production gateway installs [`IdentityTransform`]; deployments with a
/// byte-level payload processor inject their own implementation.
pub trait PayloadTransform: Send + Sync {
    fn transform(&self, data: Bytes) -> Bytes;
}

/// Passes payloads through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransform;

impl PayloadTransform for IdentityTransform {
    fn transform(&self, data: Bytes) -> Bytes {
        data
    }
}
