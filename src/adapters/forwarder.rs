use http::header;

use async_trait::async_trait;

use crate::{
    core::auth::AuthCredential,
    core::payload::Payload,
    ports::forwarder::{ForwardError, ForwardResult, OutboundRequest, RawResponse, RequestForwarder},
};

/// Outbound forwarding adapter built on `reqwest` with rustls.
///
/// Responsibilities:
/// * Builds a request-scoped client per call (opened and dropped within one
///   handler invocation, so no client state is shared across requests)
/// * Attaches Basic/Bearer credentials without ever validating them
/// * Re-derives transport-owned headers (`Host`, `Content-Length`) instead
///   of forwarding the inbound values
/// * Maps transport failures onto the [`ForwardError`] taxonomy
///
/// This adapter is intentionally minimal; retries or circuit breaking would
/// be layered on a different abstraction if ever required.
pub struct ReqwestForwarder {
    user_agent: String,
}

impl ReqwestForwarder {
    pub fn new() -> Self {
        Self {
            user_agent: format!("Portico-Gateway/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for ReqwestForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestForwarder for ReqwestForwarder {
    async fn forward(&self, request: OutboundRequest) -> ForwardResult<RawResponse> {
        let span = tracing::info_span!(
            "upstream_request",
            upstream.url = %request.url,
            http.method = %request.method,
            http.status_code = tracing::field::Empty,
        );
        let _enter = span.enter();

        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| ForwardError::InvalidRequest(e.to_string()))?;

        let mut headers = request.headers;
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let mut builder = client
            .request(request.method.as_http(), request.url.clone())
            .headers(headers)
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            Some(Payload::Json(value)) => builder.json(&value),
            Some(Payload::Bytes(bytes)) => builder.body(bytes),
            None => builder,
        };

        builder = match request.auth {
            Some(AuthCredential::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(AuthCredential::Bearer { token }) => builder.bearer_auth(token),
            None => builder,
        };

        tracing::debug!("Sending upstream request: {} {}", request.method, request.url);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ForwardError::Timeout(request.timeout.as_secs())
            } else if e.is_builder() || e.is_request() {
                ForwardError::InvalidRequest(e.to_string())
            } else {
                ForwardError::Connection(format!(
                    "Request to {} {} failed: {e}",
                    request.method, request.url
                ))
            }
        })?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = response
            .bytes()
            .await
            .map_err(|e| ForwardError::Connection(format!("Failed reading upstream body: {e}")))?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
