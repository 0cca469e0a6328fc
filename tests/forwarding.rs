// End-to-end forward pipeline tests: definitions registered through the
// registry, requests driven through the assembled router, outbound calls
// recorded by an in-memory forwarder double.
#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use axum::body::Body;
    use bytes::Bytes;
    use http::{Request, StatusCode, header};
    use portico::{
        AuthCredential, ForwardError, ForwardResult, Method, ModuleDescriptor, ModuleRegistry,
        OutboundRequest, Payload, ProxyDefinition, ProxyModule, RawResponse, RequestForwarder,
        RouteDefinition, TransformHook,
        config::{ConfigModule, ModuleConfig},
        register_modules,
    };
    use serde_json::json;
    use tower::util::ServiceExt;

    /// Records every outbound request and answers from a queued script.
    struct MockForwarder {
        requests: Mutex<Vec<OutboundRequest>>,
        responses: Mutex<VecDeque<ForwardResult<RawResponse>>>,
    }

    impl MockForwarder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(VecDeque::new()),
            })
        }

        fn push_response(&self, response: RawResponse) {
            self.responses.lock().unwrap().push_back(Ok(response));
        }

        fn push_error(&self, error: ForwardError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        fn recorded(&self) -> Vec<OutboundRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RequestForwarder for MockForwarder {
        async fn forward(&self, request: OutboundRequest) -> ForwardResult<RawResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses.lock().unwrap().pop_front().unwrap_or(Ok(RawResponse {
                status: StatusCode::OK,
                content_type: None,
                body: Bytes::new(),
            }))
        }
    }

    fn proxy() -> ProxyDefinition {
        ProxyDefinition::new("/proxy/test", "https://api.example.com", None).unwrap()
    }

    fn gateway(
        mock: Arc<MockForwarder>,
        proxy: ProxyDefinition,
        route: RouteDefinition,
        in_hook: Option<TransformHook>,
        out_hook: Option<TransformHook>,
    ) -> axum::Router {
        let mut registry = ModuleRegistry::new(mock);
        let factory = registry
            .register(ModuleDescriptor::new("test", "Test Module", ""), proxy)
            .unwrap();
        factory.register_with_hooks(route, in_hook, out_hook);
        registry.into_router()
    }

    async fn body_bytes(response: axum::response::Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn templated_get_forwards_to_substituted_upstream_path() {
        let mock = MockForwarder::new();
        mock.push_response(RawResponse {
            status: StatusCode::OK,
            content_type: Some(header::HeaderValue::from_static("application/json")),
            body: Bytes::from_static(b"{\"id\": 5, \"title\": \"t\"}"),
        });

        let route = RouteDefinition::builder("/item/{id}", "/todos/{id}", "GET")
            .path_params(["id"])
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, None, None);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/proxy/test/item/5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        // No hooks: upstream bytes pass through unchanged.
        assert_eq!(
            body_bytes(response).await,
            Bytes::from_static(b"{\"id\": 5, \"title\": \"t\"}")
        );

        let recorded = mock.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].url.as_str(), "https://api.example.com/todos/5");
        assert_eq!(recorded[0].method, Method::Get);
        assert!(recorded[0].body.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn post_with_static_body_forwards_without_inbound_body() {
        let mock = MockForwarder::new();
        let static_body = json!({"title": "test", "body": "test", "userId": 1});
        let route = RouteDefinition::builder("/post", "/posts", "POST")
            .static_body(static_body.clone())
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, None, None);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/proxy/test/post")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let recorded = mock.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].body, Some(Payload::Json(static_body)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn post_without_any_body_is_rejected_before_forwarding() {
        let mock = MockForwarder::new();
        let route = RouteDefinition::builder("/post", "/posts", "POST")
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, None, None);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/proxy/test/post")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let value: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value["error"].as_str().unwrap().contains("Invalid request"));
        // The outbound call was never attempted.
        assert!(mock.recorded().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upstream_timeout_becomes_a_structured_error_payload() {
        let mock = MockForwarder::new();
        mock.push_error(ForwardError::Timeout(30));

        let route = RouteDefinition::builder("/item", "/todos", "GET")
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, None, None);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/proxy/test/item")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let value: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value["error"].as_str().unwrap().contains("30 seconds"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn connection_failure_maps_to_bad_gateway() {
        let mock = MockForwarder::new();
        mock.push_error(ForwardError::Connection("connection refused".to_string()));

        let route = RouteDefinition::builder("/item", "/todos", "GET")
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, None, None);

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/proxy/test/item")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let value: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["status"], "failed");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn outbound_hook_can_rewrite_the_response_payload() {
        let mock = MockForwarder::new();
        mock.push_response(RawResponse {
            status: StatusCode::OK,
            content_type: Some(header::HeaderValue::from_static("application/json")),
            body: Bytes::from_static(b"{\"name\": \"a\"}"),
        });

        let out_hook: TransformHook = Arc::new(|payload| {
            let mut value = payload.as_json()?.clone();
            let name = value.get("name")?.as_str()?.to_uppercase();
            value["name"] = serde_json::Value::String(name);
            Some(Payload::Json(value))
        });

        let route = RouteDefinition::builder("/item", "/todos", "GET")
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, None, Some(out_hook));

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/proxy/test/item")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let value: serde_json::Value =
            serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(value["name"], "A");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inbound_hook_can_rewrite_the_request_body() {
        let mock = MockForwarder::new();

        let in_hook: TransformHook = Arc::new(|payload| {
            let mut value = payload.as_json()?.clone();
            value["modified"] = serde_json::Value::Bool(true);
            Some(Payload::Json(value))
        });

        let route = RouteDefinition::builder("/post", "/posts", "POST")
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, Some(in_hook), None);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/proxy/test/post")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"title": "original"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let recorded = mock.recorded();
        assert_eq!(
            recorded[0].body,
            Some(Payload::Json(json!({"title": "original", "modified": true})))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inbound_and_static_query_params_merge_with_commas() {
        let mock = MockForwarder::new();
        let route = RouteDefinition::builder("/item", "/todos", "GET")
            .query_param("a", "2")
            .query_param("limit", 10)
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, None, None);

        app.oneshot(
            Request::builder()
                .method("GET")
                .uri("/proxy/test/item?a=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

        let recorded = mock.recorded();
        assert_eq!(
            recorded[0].query,
            vec![
                ("a".to_string(), "1,2".to_string()),
                ("limit".to_string(), "10".to_string())
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn excluded_headers_never_reach_the_forwarder() {
        let mock = MockForwarder::new();
        let proxy = ProxyDefinition::new(
            "/proxy/test",
            "https://api.example.com",
            Some(["Cookie".to_string()].into_iter().collect()),
        )
        .unwrap();
        let route = RouteDefinition::builder("/item", "/todos", "GET")
            .header("x-forwarded-module", "test")
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy, route, None, None);

        app.oneshot(
            Request::builder()
                .method("GET")
                .uri("/proxy/test/item")
                .header("cookie", "session=1")
                .header("accept", "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

        let recorded = mock.recorded();
        let headers = &recorded[0].headers;
        assert!(!headers.contains_key("cookie"));
        assert_eq!(headers.get("accept").unwrap(), "application/json");
        assert_eq!(headers.get("x-forwarded-module").unwrap(), "test");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn route_credentials_ride_along_unvalidated() {
        let mock = MockForwarder::new();
        let route = RouteDefinition::builder("/item", "/todos", "GET")
            .auth(AuthCredential::Bearer {
                token: "t0ken".to_string(),
            })
            .build()
            .unwrap();
        let app = gateway(mock.clone(), proxy(), route, None, None);

        app.oneshot(
            Request::builder()
                .method("GET")
                .uri("/proxy/test/item")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

        let recorded = mock.recorded();
        assert_eq!(
            recorded[0].auth,
            Some(AuthCredential::Bearer {
                token: "t0ken".to_string()
            })
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn config_declared_module_serves_live_routes() {
        let mock = MockForwarder::new();
        let module: ModuleConfig = serde_json::from_value(json!({
            "name": "Example Module",
            "endpoint": "/proxy/example",
            "target_base": "https://api.example.com",
            "routes": [
                {
                    "path": "/item/{id}",
                    "upstream_path": "/todos/{id}",
                    "method": "GET",
                    "path_params": ["id"]
                }
            ]
        }))
        .unwrap();

        let mut registry = ModuleRegistry::new(mock.clone());
        let modules: Vec<Box<dyn ProxyModule>> =
            vec![Box::new(ConfigModule::new("example", module))];
        register_modules(&mut registry, &modules).unwrap();
        assert_eq!(registry.display_name("example"), Some("Example Module"));

        let app = registry.into_router();
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/proxy/example/item/7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            mock.recorded()[0].url.as_str(),
            "https://api.example.com/todos/7"
        );
    }
}
