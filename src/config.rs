use clap::Parser;
use std::time::Duration;

use crate::conversation::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};

// Every option can also be supplied through the environment (or a .env file).
#[derive(Parser, Debug, Clone)]
#[command(name = "storefront-gateway")]
#[command(about = "Caching gateway for a commerce GraphQL API and a storefront chat assistant")]
pub struct Settings {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    // Store domain, e.g. "demo.myshopify.com"
    #[arg(long, env = "SHOPIFY_STORE_NAME")]
    pub store_domain: String,

    // Admin API access token; checked when a catalog call is made
    #[arg(long, env = "SHOPIFY_ADMIN_API_PASS_TOKEN", hide_env_values = true)]
    pub store_access_token: Option<String>,

    #[arg(long, env = "SHOPIFY_API_VERSION", default_value = "2024-10")]
    pub api_version: String,

    // Generative backend API key; checked when a chat request is made
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    pub gemini_base_url: String,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    // Keep the cache in process instead of redis
    #[arg(long, env = "MEMORY_CACHE", default_value_t = false)]
    pub memory_cache: bool,

    // Comma-separated list, e.g. "http://localhost:3000,https://shop.example"
    #[arg(long, env = "ALLOWED_ORIGINS")]
    pub allowed_origins: String,

    // Cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL_SECS", default_value_t = 30)]
    pub cache_ttl: u64,
}

impl Settings {
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim()) // remove spaces
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }
}
