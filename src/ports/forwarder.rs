use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use thiserror::Error;
use url::Url;

use crate::core::{auth::AuthCredential, definition::Method, payload::Payload};

/// Custom error type for outbound forwarding operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ForwardError {
    /// Error when the connection to the upstream fails
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error when the outbound call times out
    #[error("Timeout error after {0} seconds")]
    Timeout(u64),

    /// Error when the outbound request cannot be constructed or sent
    #[error("Invalid outbound request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for forwarding operations
pub type ForwardResult<T> = Result<T, ForwardError>;

/// One fully-resolved outbound call: everything the transport needs, nothing
/// left to derive from the inbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Payload>,
    pub auth: Option<AuthCredential>,
    pub timeout: Duration,
}

/// The upstream's answer, body fully buffered.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

/// RequestForwarder defines the port (interface) for issuing outbound HTTP
/// calls to upstream services.
#[async_trait]
pub trait RequestForwarder: Send + Sync + 'static {
    /// Issue exactly one HTTP call for the given request.
    ///
    /// No retries, no failover; a transport failure surfaces as a
    /// [`ForwardError`] for the handler boundary to translate.
    async fn forward(&self, request: OutboundRequest) -> ForwardResult<RawResponse>;
}
