use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::catalog::CatalogError;
use crate::conversation::ChatError;
use crate::executor::ExecuteError;

// Every failure a handler can report. Responses carry a plain-text message only.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid JSON request body: {}", rejection.body_text()))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Catalog(CatalogError::Query(_)) => StatusCode::BAD_REQUEST,
            AppError::Catalog(CatalogError::Execute(ExecuteError::MissingCredential)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Catalog(CatalogError::Execute(_)) => StatusCode::BAD_GATEWAY,
            AppError::Chat(ChatError::EmptyMessage) => StatusCode::BAD_REQUEST,
            AppError::Chat(ChatError::MissingCredential) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Chat(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Catalog(CatalogError::Execute(e)) => {
                format!("Error executing GraphQL request: {e}")
            }
            AppError::Chat(e) if status.is_server_error() => format!("Error processing chat: {e}"),
            other => other.to_string(),
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "configuration error");
        }
        (status, message).into_response()
    }
}
