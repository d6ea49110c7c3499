use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::cache::{CacheAside, ResourceKey};
use crate::executor::{ExecuteError, Executor};
use crate::query::{Handle, MetafieldUpdate, Operation, ProductId, QueryBuilder, QueryError};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

// Catalog reads go through the cache-aside layer. The metafield mutation
// goes straight upstream and then drops every cached view of the product.
#[derive(Clone)]
pub struct CatalogService {
    executor: Arc<dyn Executor>,
    cache: CacheAside,
    ttl: Duration,
}

impl CatalogService {
    pub fn new(executor: Arc<dyn Executor>, cache: CacheAside, ttl: Duration) -> Self {
        Self { executor, cache, ttl }
    }

    pub async fn list_products(&self) -> Result<Vec<u8>, CatalogError> {
        self.read(Operation::ListProducts).await
    }

    pub async fn product_by_id(&self, raw_id: &str) -> Result<Vec<u8>, CatalogError> {
        let id = ProductId::parse(raw_id)?;
        self.read(Operation::ProductById(id)).await
    }

    pub async fn product_by_handle(&self, raw_handle: &str) -> Result<Vec<u8>, CatalogError> {
        let handle = Handle::parse(raw_handle)?;
        self.read(Operation::ProductByHandle(handle)).await
    }

    pub async fn update_metafield(&self, update: MetafieldUpdate) -> Result<Vec<u8>, CatalogError> {
        let product = update.product.clone();
        let operation = Operation::UpdateMetafield(update);
        let query = QueryBuilder::build(&operation);
        let body = self.executor.execute(&query).await?;

        let mut stale = vec![ResourceKey::products(), ResourceKey::product_by_id(product.as_str())];
        if let Some(handle) = mutated_handle(&body) {
            stale.push(ResourceKey::product_by_handle(handle.as_str()));
        }
        for key in &stale {
            self.cache.invalidate(key).await;
        }
        info!(product = product.as_str(), invalidated = stale.len(), "metafield updated");
        Ok(body)
    }

    async fn read(&self, operation: Operation) -> Result<Vec<u8>, CatalogError> {
        let query = QueryBuilder::build(&operation);
        let Some(key) = operation.resource_key() else {
            return Ok(self.executor.execute(&query).await?);
        };
        self.cache
            .get_or_populate(&key, self.ttl, || async {
                self.executor.execute(&query).await.map_err(CatalogError::from)
            })
            .await
    }
}

// Handle reported back by the mutation, if it is one we could have cached under.
fn mutated_handle(body: &[u8]) -> Option<Handle> {
    let parsed: Value = serde_json::from_slice(body).ok()?;
    let raw = parsed
        .pointer("/data/productUpdate/product/handle")?
        .as_str()?;
    Handle::parse(raw).ok()
}
