use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::UPSTREAM_CALLS;
use crate::query::UpstreamQuery;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("store access token is not configured")]
    MissingCredential,
    #[error("request to commerce API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("commerce API responded with status {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("commerce API reported errors: {body}")]
    Graphql { body: String },
    #[error("could not decode commerce API response: {0}")]
    Decode(String),
}

// Seam between the catalog service and the commerce API, so handlers can be
// exercised against test doubles.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, query: &UpstreamQuery) -> Result<Vec<u8>, ExecuteError>;
}

// Single-attempt GraphQL client for the commerce admin API.
#[derive(Clone)]
pub struct GraphqlExecutor {
    client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl GraphqlExecutor {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            access_token: access_token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn admin_endpoint(store_domain: &str, api_version: &str) -> String {
        let domain = store_domain
            .trim()
            .trim_start_matches("https://")
            .trim_end_matches('/');
        format!("https://{domain}/admin/api/{api_version}/graphql.json")
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Executor for GraphqlExecutor {
    async fn execute(&self, query: &UpstreamQuery) -> Result<Vec<u8>, ExecuteError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(ExecuteError::MissingCredential)?;

        debug!(operation = query.operation, "calling commerce API");
        let result = self
            .client
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", token)
            .json(&json!({ "query": query.text }))
            .send()
            .await;

        let res = match result {
            Ok(res) => res,
            Err(e) => {
                UPSTREAM_CALLS.with_label_values(&["commerce", "transport_error"]).inc();
                warn!(operation = query.operation, error = %e, "commerce API unreachable");
                return Err(ExecuteError::Transport(e));
            }
        };

        let status = res.status();
        let body = match res.bytes().await {
            Ok(body) => body,
            Err(e) => {
                UPSTREAM_CALLS.with_label_values(&["commerce", "transport_error"]).inc();
                warn!(operation = query.operation, error = %e, "commerce API response body unreadable");
                return Err(ExecuteError::Transport(e));
            }
        };

        if !status.is_success() {
            UPSTREAM_CALLS.with_label_values(&["commerce", "upstream_error"]).inc();
            let body = String::from_utf8_lossy(&body).into_owned();
            warn!(operation = query.operation, %status, "commerce API returned an error");
            return Err(ExecuteError::Upstream { status, body });
        }

        // the payload is passed through untouched, but it must carry a `data` object;
        // a 200 with only `errors` (throttling, bad query) is a failed call
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) if map.get("data").is_some_and(Value::is_object) => {}
            Ok(Value::Object(_)) => {
                UPSTREAM_CALLS.with_label_values(&["commerce", "graphql_error"]).inc();
                let body = String::from_utf8_lossy(&body).into_owned();
                warn!(operation = query.operation, "commerce API returned no data");
                return Err(ExecuteError::Graphql { body });
            }
            Ok(other) => {
                UPSTREAM_CALLS.with_label_values(&["commerce", "decode_error"]).inc();
                return Err(ExecuteError::Decode(format!("expected a JSON object, got {other}")));
            }
            Err(e) => {
                UPSTREAM_CALLS.with_label_values(&["commerce", "decode_error"]).inc();
                return Err(ExecuteError::Decode(e.to_string()));
            }
        }

        UPSTREAM_CALLS.with_label_values(&["commerce", "ok"]).inc();
        Ok(body.to_vec())
    }
}
