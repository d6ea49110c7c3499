use axum::extract::Request;
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers::{
    chat_handler, health_handler, list_products_handler, metrics_handler,
    product_by_handle_handler, product_by_id_handler, update_metafield_handler,
};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::state::AppState;

pub fn router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let shopify = Router::new()
        .route("/v2/products", get(list_products_handler))
        .route("/v2/products/by-id/{id}", get(product_by_id_handler))
        .route("/v2/products/by-name/{name}", get(product_by_handle_handler))
        .route("/product/metafield", post(update_metafield_handler));

    let chatbot = Router::new().route("/chat", post(chat_handler));

    Router::new()
        .nest("/api/shopify", shopify)
        .nest("/api/chatbot", chatbot)
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(middleware::from_fn(track_requests))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn track_requests(request: Request, next: Next) -> Response {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();
    let response = next.run(request).await;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    response
}
