// End-to-end request flow: gateway router in front of live local services.
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, Uri, header},
    routing::{get, post},
};
use conduit::{
    adapters::{HttpClientAdapter, MemoryCacheStore},
    app,
    config::{GatewayConfig, ServiceConfig},
    core::{ServicesRegistry, TokenFingerprint, response_cache::CACHE_STATUS_HEADER},
    ports::{CacheStore, HttpClient},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

async fn spawn(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Address nothing listens on.
async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn currency_service(hits: Arc<AtomicUsize>) -> String {
    async fn rates(State(hits): State<Arc<AtomicUsize>>, uri: Uri) -> Json<Value> {
        hits.fetch_add(1, Ordering::SeqCst);
        Json(json!({"base": uri.query().unwrap_or(""), "USD": 1.0, "EUR": 0.92}))
    }

    async fn echo(uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(json!({
            "path": uri.path(),
            "query": uri.query(),
            "host": header("host"),
            "custom": header("x-custom"),
            "authorization": header("authorization"),
            "body": String::from_utf8_lossy(&body),
        }))
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "late"
    }

    let router = Router::new()
        .route("/api/v1/rates", get(rates))
        .route("/api/v1/echo/{*rest}", post(echo).put(echo))
        .route("/api/v1/slow", get(slow))
        .route("/api/v1/health", get(|| async { "ok" }))
        .with_state(hits);
    spawn(router).await
}

/// Accepts exactly the token "good"; "expired" gets a 500 like a crashing
/// verifier would.
async fn users_service(verifications: Arc<AtomicUsize>) -> String {
    async fn verify(
        State(verifications): State<Arc<AtomicUsize>>,
        headers: HeaderMap,
    ) -> StatusCode {
        verifications.fetch_add(1, Ordering::SeqCst);
        match headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            Some("Bearer good") => StatusCode::OK,
            Some("Bearer expired") => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    let router = Router::new()
        .route("/api/v1/verify_token", post(verify))
        .route("/api/v1/login", post(|| async { Json(json!({"token": "good"})) }))
        .route("/api/v1/health", get(|| async { "ok" }))
        .with_state(verifications);
    spawn(router).await
}

struct Harness {
    router: Router,
    store: Arc<MemoryCacheStore>,
    downstream_hits: Arc<AtomicUsize>,
    verifications: Arc<AtomicUsize>,
}

async fn harness_with(users_url: Option<String>, extra: Vec<ServiceConfig>) -> Harness {
    let downstream_hits = Arc::new(AtomicUsize::new(0));
    let verifications = Arc::new(AtomicUsize::new(0));
    let currency_url = currency_service(downstream_hits.clone()).await;
    let users_url = match users_url {
        Some(url) => url,
        None => users_service(verifications.clone()).await,
    };

    let mut services = vec![
        ServiceConfig::builder("currency_service", currency_url)
            .prefix("/api/v1")
            .health_check("/health")
            .build(),
        ServiceConfig::builder("users_service", users_url)
            .prefix("/api/v1")
            .build(),
    ];
    services.extend(extra);
    let registry = Arc::new(ServicesRegistry::new(services));

    let mut config = GatewayConfig::default();
    config.proxy_timeout_secs = 1;
    config.health_timeout_secs = 1;
    config.auth.verify_timeout_secs = 1;

    let store = Arc::new(MemoryCacheStore::new());
    let cache: Arc<dyn CacheStore> = store.clone();
    let http_client: Arc<dyn HttpClient> = Arc::new(HttpClientAdapter::new().unwrap());
    let router = app::build_gateway(&config, registry, cache, http_client, None).unwrap();

    Harness {
        router,
        store,
        downstream_hits,
        verifications,
    }
}

async fn harness() -> Harness {
    harness_with(None, Vec::new()).await
}

fn get_with(uri: &str, token: Option<&str>) -> Request {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_valid_token_reaches_service() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/currency_service/rates?base=USD", Some("good")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["base"], "base=USD");
    assert_eq!(h.verifications.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_verified_token_is_not_reverified() {
    let h = harness().await;

    for uri in ["/currency_service/rates?a=1", "/currency_service/rates?a=2"] {
        let response = h
            .router
            .clone()
            .oneshot(get_with(uri, Some("good")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(h.verifications.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.store
            .get(&TokenFingerprint::of("good").validity_key())
            .await
            .as_deref(),
        Some("good")
    );
}

#[tokio::test]
async fn test_missing_header_is_rejected() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/currency_service/rates", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await["message"],
        "Missing or invalid Authorization header"
    );
    assert_eq!(h.downstream_hits.load(Ordering::SeqCst), 0);
    assert_eq!(h.verifications.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_refused_and_erroring_tokens_are_invalid() {
    let h = harness().await;

    for token in ["forged", "expired"] {
        let response = h
            .router
            .clone()
            .oneshot(get_with("/currency_service/rates", Some(token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "token {token}");
        assert_eq!(json_body(response).await["message"], "Invalid token");
    }
    assert_eq!(h.downstream_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_blacklisted_token_is_rejected_without_verification() {
    let h = harness().await;
    let fingerprint = TokenFingerprint::of("good");
    h.store
        .set(&fingerprint.validity_key(), "true", None)
        .await;
    h.store
        .set(&fingerprint.blacklist_key(), "true", None)
        .await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/currency_service/rates", Some("good")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["message"], "Token has been revoked");
    assert_eq!(h.verifications.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_authority_fails_closed() {
    let h = harness_with(Some(closed_port().await), Vec::new()).await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/currency_service/rates", Some("good")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["message"], "Authentication failed");
    assert_eq!(h.downstream_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_public_endpoint_needs_no_token() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users_service/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["token"], "good");
    assert_eq!(h.verifications.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_request_is_forwarded_transparently() {
    let h = harness().await;

    let request = Request::builder()
        .method("POST")
        .uri("/currency_service/echo/convert/a%20b?amount=10&to=EUR")
        .header(header::HOST, "gateway.example")
        .header(header::AUTHORIZATION, "Bearer good")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-custom", "kept")
        .body(Body::from(r#"{"from":"USD"}"#))
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = json_body(response).await;
    assert_eq!(seen["path"], "/api/v1/echo/convert/a%20b");
    assert_eq!(seen["query"], "amount=10&to=EUR");
    assert_eq!(seen["custom"], "kept");
    assert_eq!(seen["authorization"], "Bearer good");
    assert_eq!(seen["body"], r#"{"from":"USD"}"#);
    let host = seen["host"].as_str().unwrap();
    assert!(host.starts_with("127.0.0.1:"), "host was {host}");
}

#[tokio::test]
async fn test_unknown_service_is_not_found() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/billing_service/invoices", Some("good")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(response).await["message"],
        "Unknown service: billing_service"
    );
}

#[tokio::test]
async fn test_get_responses_are_cached() {
    let h = harness().await;

    let first = h
        .router
        .clone()
        .oneshot(get_with("/currency_service/rates?to=EUR&from=USD", Some("good")))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert!(first.headers().get(CACHE_STATUS_HEADER).is_none());
    let fresh = json_body(first).await;

    // Same parameters, differently encoded, hit the same entry.
    let second = h
        .router
        .clone()
        .oneshot(get_with("/currency_service/rates?to=%45UR&from=USD", Some("good")))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()[CACHE_STATUS_HEADER], "hit");
    assert_eq!(json_body(second).await, fresh);

    assert_eq!(h.downstream_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refused_connection_is_bad_gateway() {
    let ghost = ServiceConfig::builder("ghost_service", closed_port().await).build();
    let h = harness_with(None, vec![ghost]).await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/ghost_service/anything", Some("good")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/currency_service/slow", Some("good")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_health_reports_services() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"], true);
    assert_eq!(body["services"]["currency_service"], "healthy");
    assert_eq!(body["services"]["users_service"], "unchecked");
}

#[tokio::test]
async fn test_health_degrades_with_down_service() {
    let ghost = ServiceConfig::builder("ghost_service", closed_port().await)
        .health_check("/health")
        .build();
    let h = harness_with(None, vec![ghost]).await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["ghost_service"], "unhealthy");
}

#[tokio::test]
async fn test_index_lists_services() {
    let h = harness().await;

    let response = h
        .router
        .clone()
        .oneshot(get_with("/", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["service"], "conduit");
    assert!(
        body["services"]
            .as_array()
            .unwrap()
            .contains(&json!("currency_service"))
    );
}
