use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{CacheAside, CacheError, CacheStore, MemoryStore, RedisStore};
use crate::catalog::CatalogService;
use crate::config::Settings;
use crate::conversation::{ConversationAssembler, GeminiBackend, GenerationParams};
use crate::executor::GraphqlExecutor;
use crate::seed::storefront_seed;

// app's shared state. Every dependency is constructed once and injected.
pub struct AppState {
    pub catalog: CatalogService,
    pub chat: ConversationAssembler,
}

impl AppState {
    pub fn new(catalog: CatalogService, chat: ConversationAssembler) -> Self {
        Self { catalog, chat }
    }

    pub async fn from_settings(settings: &Settings) -> Result<Self, CacheError> {
        // one HTTP client shared by both upstreams
        let client = reqwest::Client::new();

        let store: Arc<dyn CacheStore> = if settings.memory_cache {
            info!("using in-process cache store");
            Arc::new(MemoryStore::new())
        } else {
            let redis = RedisStore::new(&settings.redis_url)?;
            redis.ping().await?;
            info!(url = %settings.redis_url, "connected to redis");
            Arc::new(redis)
        };

        if settings.store_access_token.is_none() {
            warn!("SHOPIFY_ADMIN_API_PASS_TOKEN is not set, catalog requests will fail");
        }
        if settings.gemini_api_key.is_none() {
            warn!("GEMINI_API_KEY is not set, chat requests will fail");
        }

        let executor = GraphqlExecutor::new(
            client.clone(),
            GraphqlExecutor::admin_endpoint(&settings.store_domain, &settings.api_version),
            settings.store_access_token.clone(),
        );
        info!(endpoint = executor.endpoint(), "commerce API configured");

        let catalog = CatalogService::new(Arc::new(executor), CacheAside::new(store), settings.ttl());

        let backend = GeminiBackend::new(client, settings.gemini_api_key.clone())
            .with_base_url(&settings.gemini_base_url)
            .with_model(&settings.gemini_model);
        let chat = ConversationAssembler::new(
            storefront_seed(),
            GenerationParams::default(),
            Arc::new(backend),
        );

        Ok(Self::new(catalog, chat))
    }
}
