//! Binds route definitions to live routes and runs the forward pipeline.
//!
//! A [`RouteHandlerFactory`] is created per module by the registry, bound to
//! that module's [`ProxyDefinition`]. Each `register` call produces one live
//! route on the host router whose handler executes the forward pipeline:
//! path template resolution, header filtering, query and body merging,
//! optional transform hooks, and delegation to the [`RequestForwarder`]
//! port. Forwarding-time failures never propagate to the host router; they
//! are translated into a structured JSON error payload at the handler
//! boundary.
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    extract::{RawPathParams, RawQuery},
    response::Response,
    routing::{MethodFilter, on},
};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use thiserror::Error;
use tracing::Instrument;

use crate::{
    core::{
        definition::{Method, ProxyDefinition, RouteDefinition},
        payload::{self, Payload, PayloadTransform, TransformHook},
        pipeline,
    },
    ports::forwarder::{ForwardError, OutboundRequest, RawResponse, RequestForwarder},
    tracing_setup,
};

/// Request-time error for one forwarded call.
///
/// Every variant is caught at the handler boundary and rendered as the
/// `{"error": ..., "status": "failed"}` payload with a status class of its
/// own; none of them surface as faults to the host router.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The request violates a route precondition (POST with no body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A declared path parameter was absent from the matched route.
    #[error("Missing path parameter: {0}")]
    PathParameter(String),

    /// The outbound call failed at the transport level.
    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::PathParameter(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Forward(ForwardError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Forward(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Render the wire-format error payload.
    pub fn into_response(self) -> Response {
        let payload = serde_json::json!({
            "error": self.to_string(),
            "status": "failed",
        });
        let mut response = Response::new(Body::from(payload.to_string()));
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

/// Everything one live route's handler needs, captured once at registration.
struct BoundRoute {
    proxy: Arc<ProxyDefinition>,
    route: RouteDefinition,
    in_hook: Option<TransformHook>,
    out_hook: Option<TransformHook>,
    forwarder: Arc<dyn RequestForwarder>,
    payload_transform: Arc<dyn PayloadTransform>,
}

/// Binds a module's route definitions to live routes on the host router.
///
/// Obtained from [`ModuleRegistry::register`]; routes accumulate on an
/// internal router that the registry merges into the gateway application
/// once startup registration is complete.
///
/// [`ModuleRegistry::register`]: crate::core::registry::ModuleRegistry::register
pub struct RouteHandlerFactory {
    proxy: Arc<ProxyDefinition>,
    forwarder: Arc<dyn RequestForwarder>,
    payload_transform: Arc<dyn PayloadTransform>,
    router: Mutex<Router>,
}

impl std::fmt::Debug for RouteHandlerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandlerFactory")
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl RouteHandlerFactory {
    pub fn new(
        proxy: ProxyDefinition,
        forwarder: Arc<dyn RequestForwarder>,
        payload_transform: Arc<dyn PayloadTransform>,
    ) -> Self {
        Self {
            proxy: Arc::new(proxy),
            forwarder,
            payload_transform,
            router: Mutex::new(Router::new()),
        }
    }

    pub fn proxy(&self) -> &ProxyDefinition {
        &self.proxy
    }

    /// Bind one route with no transform hooks.
    pub fn register(&self, route: RouteDefinition) {
        self.register_with_hooks(route, None, None);
    }

    /// Bind one route, optionally attaching inbound/outbound transform
    /// hooks. The live path is the module endpoint prefix concatenated with
    /// the route's local path; `{name}` segments become router captures.
    pub fn register_with_hooks(
        &self,
        route: RouteDefinition,
        in_hook: Option<TransformHook>,
        out_hook: Option<TransformHook>,
    ) {
        let path = format!("{}{}", self.proxy.endpoint(), route.local_path());
        let filter = method_filter(route.method());
        tracing::info!(path = %path, method = %route.method(), "registering proxy route");

        let bound = Arc::new(BoundRoute {
            proxy: Arc::clone(&self.proxy),
            route,
            in_hook,
            out_hook,
            forwarder: Arc::clone(&self.forwarder),
            payload_transform: Arc::clone(&self.payload_transform),
        });

        let handler = move |path_params: RawPathParams,
                            raw_query: RawQuery,
                            headers: HeaderMap,
                            body: Bytes| {
            let bound = Arc::clone(&bound);
            async move { handle(bound, path_params, raw_query, headers, body).await }
        };

        let mut router = self.router.lock().expect("route registration lock poisoned");
        *router = std::mem::take(&mut *router).route(&path, on(filter, handler));
    }

    /// Hand the accumulated routes over for merging into the gateway
    /// application, leaving this factory empty.
    pub fn take_router(&self) -> Router {
        std::mem::take(&mut *self.router.lock().expect("route registration lock poisoned"))
    }
}

fn method_filter(method: Method) -> MethodFilter {
    match method {
        Method::Get => MethodFilter::GET,
        Method::Post => MethodFilter::POST,
        Method::Put => MethodFilter::PUT,
        Method::Patch => MethodFilter::PATCH,
        Method::Delete => MethodFilter::DELETE,
    }
}

async fn handle(
    bound: Arc<BoundRoute>,
    path_params: RawPathParams,
    raw_query: RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing_setup::create_request_span(
        bound.route.method().as_str(),
        bound.route.local_path(),
        &request_id,
    );

    async move {
        match forward_pipeline(&bound, path_params, raw_query, headers, body).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "forwarding failed");
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn forward_pipeline(
    bound: &BoundRoute,
    path_params: RawPathParams,
    RawQuery(raw_query): RawQuery,
    inbound_headers: HeaderMap,
    inbound_body: Bytes,
) -> Result<Response, HandlerError> {
    let route = &bound.route;
    let proxy = &bound.proxy;

    let matched: Vec<(String, String)> = path_params
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    for name in route.path_params() {
        if !matched.iter().any(|(key, _)| key == name) {
            return Err(HandlerError::PathParameter(name.clone()));
        }
    }
    let resolved_path = pipeline::resolve_upstream_path(route.upstream_path(), &matched)?;

    let outbound_headers = pipeline::merge_headers(
        &inbound_headers,
        route.static_headers(),
        proxy.excluded_headers(),
    );
    let query = pipeline::merge_query(raw_query.as_deref(), route.query_params());

    let mut outbound_body = pipeline::merge_body(
        route.method(),
        route.static_body(),
        &inbound_body,
        bound.payload_transform.as_ref(),
    );
    if let (Some(hook), Some(current)) = (&bound.in_hook, outbound_body.as_ref()) {
        if let Some(replacement) = hook(current) {
            outbound_body = Some(replacement);
        }
    }

    // POST is the only method categorically rejected without a body.
    if route.method() == Method::Post && outbound_body.is_none() {
        return Err(HandlerError::InvalidRequest(
            "POST request resolved to an empty body".to_string(),
        ));
    }

    let url = proxy
        .upstream_url(&resolved_path)
        .map_err(|e| HandlerError::InvalidRequest(format!("Unresolvable upstream URL: {e}")))?;

    let RawResponse {
        status,
        content_type,
        body,
    } = bound
        .forwarder
        .forward(OutboundRequest {
            url,
            method: route.method(),
            headers: outbound_headers,
            query,
            body: outbound_body,
            auth: route.auth().cloned(),
            timeout: route.timeout(),
        })
        .await?;

    tracing::Span::current().record("http.status_code", status.as_u16());

    // Without an outbound hook the upstream bytes pass through untouched.
    let (response_body, response_content_type) = match &bound.out_hook {
        None => (body, content_type),
        Some(_) => match payload::apply_hook(bound.out_hook.as_ref(), Payload::from_bytes(body)) {
            Payload::Json(value) => (
                Bytes::from(value.to_string()),
                Some(HeaderValue::from_static("application/json")),
            ),
            Payload::Bytes(bytes) => (bytes, content_type),
        },
    };

    let mut response = Response::new(Body::from(response_body));
    if let Some(value) = response_content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}
