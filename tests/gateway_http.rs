use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storefront_gateway::cache::{CacheAside, MemoryStore};
use storefront_gateway::catalog::CatalogService;
use storefront_gateway::conversation::{
    ChatError, ConversationAssembler, ConversationHistory, GenerationParams, GenerativeBackend,
    Seed, Turn,
};
use storefront_gateway::executor::{ExecuteError, Executor};
use storefront_gateway::models::ChatResponse;
use storefront_gateway::query::UpstreamQuery;
use storefront_gateway::routes::router;
use storefront_gateway::state::AppState;
use tower::util::ServiceExt;

#[derive(Default)]
struct CountingExecutor {
    calls: AtomicUsize,
}

#[async_trait]
impl Executor for CountingExecutor {
    async fn execute(&self, query: &UpstreamQuery) -> Result<Vec<u8>, ExecuteError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!(r#"{{"data":{{"operation":"{}","call":{n}}}}}"#, query.operation).into_bytes())
    }
}

struct FailingExecutor;

#[async_trait]
impl Executor for FailingExecutor {
    async fn execute(&self, _query: &UpstreamQuery) -> Result<Vec<u8>, ExecuteError> {
        Err(ExecuteError::Upstream {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "maintenance".to_string(),
        })
    }
}

#[derive(Default)]
struct EchoBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl GenerativeBackend for EchoBackend {
    async fn dispatch(
        &self,
        history: &ConversationHistory,
        _params: &GenerationParams,
    ) -> Result<String, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = history.turns().last().map(|t| t.content.clone()).unwrap_or_default();
        Ok(format!("echo: {last}"))
    }
}

fn app(executor: Arc<dyn Executor>, backend: Arc<EchoBackend>) -> Router {
    let catalog = CatalogService::new(
        executor,
        CacheAside::new(Arc::new(MemoryStore::new())),
        Duration::from_secs(30),
    );
    let chat = ConversationAssembler::new(
        Seed::new("be brief", vec![Turn::user("hi"), Turn::model("hello")]),
        GenerationParams::default(),
        backend,
    );
    router(Arc::new(AppState::new(catalog, chat)), &["http://localhost:3000".to_string()])
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test(start_paused = true)]
async fn product_list_is_cached_until_ttl_elapses() {
    let executor = Arc::new(CountingExecutor::default());
    let app = app(executor.clone(), Arc::new(EchoBackend::default()));

    let first = app.clone().oneshot(get("/api/shopify/v2/products")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(
        first.headers().get("content-type").unwrap(),
        "application/json"
    );
    let first = body_bytes(first).await;
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

    let second = app.clone().oneshot(get("/api/shopify/v2/products")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_bytes(second).await, first);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(31)).await;

    let third = app.clone().oneshot(get("/api/shopify/v2/products")).await.unwrap();
    assert_eq!(third.status(), StatusCode::OK);
    assert_ne!(body_bytes(third).await, first);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn lookups_by_id_and_handle_use_separate_entries() {
    let executor = Arc::new(CountingExecutor::default());
    let app = app(executor.clone(), Arc::new(EchoBackend::default()));

    for uri in [
        "/api/shopify/v2/products/by-id/123",
        "/api/shopify/v2/products/by-name/red-dress",
        "/api/shopify/v2/products/by-id/123",
        "/api/shopify/v2/products/by-id/124",
    ] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn malformed_identifier_is_a_client_error() {
    let executor = Arc::new(CountingExecutor::default());
    let app = app(executor.clone(), Arc::new(EchoBackend::default()));

    let response = app
        .oneshot(get("/api/shopify/v2/products/by-name/red%22dress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_failure_is_reported_with_status() {
    let app = app(Arc::new(FailingExecutor), Arc::new(EchoBackend::default()));

    let response = app.oneshot(get("/api/shopify/v2/products")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("503"), "{text}");
    assert!(text.contains("maintenance"), "{text}");
}

#[tokio::test]
async fn metafield_update_without_id_is_rejected_before_upstream() {
    let executor = Arc::new(CountingExecutor::default());
    let app = app(executor.clone(), Arc::new(EchoBackend::default()));

    let response = app
        .oneshot(post_json(
            "/api/shopify/product/metafield",
            json!({ "namespace": "custom", "key": "k", "value": "v", "type": "single_line_text_field" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn metafield_update_invalidates_cached_list() {
    let executor = Arc::new(CountingExecutor::default());
    let app = app(executor.clone(), Arc::new(EchoBackend::default()));

    app.clone().oneshot(get("/api/shopify/v2/products")).await.unwrap();
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/shopify/product/metafield",
            json!({
                "id": "gid://shopify/Product/123",
                "namespace": "custom",
                "key": "model_url",
                "value": "https://cdn.example/model.glb",
                "type": "url"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    app.clone().oneshot(get("/api/shopify/v2/products")).await.unwrap();

    // list, mutation, list again after invalidation
    assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn chat_with_empty_input_never_calls_backend() {
    let backend = Arc::new(EchoBackend::default());
    let app = app(Arc::new(CountingExecutor::default()), backend.clone());

    let response = app
        .clone()
        .oneshot(post_json("/api/chatbot/chat", json!({ "userInput": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json("/api/chatbot/chat", json!({ "message": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chat_returns_model_reply() {
    let backend = Arc::new(EchoBackend::default());
    let app = app(Arc::new(CountingExecutor::default()), backend.clone());

    let response = app
        .oneshot(post_json("/api/chatbot/chat", json!({ "userInput": "any jackets?" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: ChatResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(parsed.response, "echo: any jackets?");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn health_and_metrics_are_served() {
    let app = app(Arc::new(CountingExecutor::default()), Arc::new(EchoBackend::default()));

    let health = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body_bytes(health).await).unwrap();
    assert_eq!(health["status"], "healthy");

    let metrics = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(metrics.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(metrics).await).unwrap();
    assert!(text.contains("gateway_requests_total"));
}
