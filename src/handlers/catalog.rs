use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::MetafieldRequest;
use crate::query::MetafieldUpdate;
use crate::state::AppState;

// upstream payloads are forwarded as-is
fn json_bytes(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

pub async fn list_products_handler(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let body = state.catalog.list_products().await?;
    Ok(json_bytes(body))
}

pub async fn product_by_id_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let body = state.catalog.product_by_id(&id).await?;
    Ok(json_bytes(body))
}

pub async fn product_by_handle_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let body = state.catalog.product_by_handle(&name).await?;
    Ok(json_bytes(body))
}

pub async fn update_metafield_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<MetafieldRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(req) = payload?;
    let update = MetafieldUpdate::new(&req.id, &req.namespace, &req.key, &req.value, &req.kind)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let body = state.catalog.update_metafield(update).await?;
    Ok(json_bytes(body))
}
