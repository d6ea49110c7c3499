use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::metrics::{CACHE_HITS, CACHE_MISSES, CACHE_SIZE, CACHE_STORE_ERRORS};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

// Canonical identity of a cacheable fetch.
// Built only from already-validated parameters, so distinct inputs never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn products() -> Self {
        Self("catalog:products".to_string())
    }

    pub fn product_by_id(id: &str) -> Self {
        Self(format!("catalog:product:id:{id}"))
    }

    pub fn product_by_handle(handle: &str) -> Self {
        Self(format!("catalog:product:handle:{handle}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Backing store shared by every request. Implementations must be safe for
// concurrent use without external locking.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &ResourceKey, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &ResourceKey) -> Result<(), CacheError>;
}

// Cache entry with expiry
#[derive(Clone)]
pub struct CacheEntry {
    pub payload: Vec<u8>,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

// In-process store. Expired entries are dropped lazily on read.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key.as_str()) {
            if entry.is_fresh(now) {
                return Ok(Some(entry.payload.clone()));
            }
        }
        // only remove if still expired, a concurrent writer may have refreshed it
        if self
            .entries
            .remove_if(key.as_str(), |_, entry| !entry.is_fresh(now))
            .is_some()
        {
            CACHE_SIZE.set(self.entries.len() as f64);
        }
        Ok(None)
    }

    async fn set(&self, key: &ResourceKey, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.as_str().to_string(),
            CacheEntry {
                payload: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), CacheError> {
        self.entries.remove(key.as_str());
        CACHE_SIZE.set(self.entries.len() as f64);
        Ok(())
    }
}

const REDIS_TIMEOUT: Duration = Duration::from_secs(2);

// Redis-backed store. The connection manager is created on first use and
// re-dials after the socket drops. Dials are not retried in place: the next
// command dials again, so a dead server costs one refused connect per call.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
}

impl RedisStore {
    pub fn new(url: impl AsRef<str>) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(url.as_ref())?,
            conn: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let conn = self
            .conn
            .get_or_try_init(|| {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(0)
                    .set_connection_timeout(REDIS_TIMEOUT)
                    .set_response_timeout(REDIS_TIMEOUT);
                self.client.get_connection_manager_with_config(config)
            })
            .await?;
        Ok(conn.clone())
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply != "PONG" {
            return Err(CacheError::Unavailable(format!("unexpected PING reply: {reply}")));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<Vec<u8>> = conn.get(key.as_str()).await?;
        Ok(raw)
    }

    async fn set(&self, key: &ResourceKey, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // redis expiry has whole-second granularity here, never let it round to 0
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key.as_str(), value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key.as_str()).await?;
        Ok(())
    }
}

// Get-or-populate policy over a shared store. The hit check and the later
// population are separate store calls, so concurrent cold requests for one
// key each fetch and each write. Last writer wins.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get_or_populate<F, Fut, E>(
        &self,
        key: &ResourceKey,
        ttl: Duration,
        fetch: F,
    ) -> Result<Vec<u8>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
    {
        match self.store.get(key).await {
            Ok(Some(cached)) => {
                CACHE_HITS.inc();
                debug!(key = %key, "cache hit");
                return Ok(cached);
            }
            Ok(None) => {}
            // an unreadable store degrades to a miss
            Err(e) => {
                CACHE_STORE_ERRORS.inc();
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
            }
        }

        CACHE_MISSES.inc();
        debug!(key = %key, "cache miss, fetching upstream");

        // failures propagate untouched and are never stored
        let fresh = fetch().await?;

        if let Err(e) = self.store.set(key, &fresh, ttl).await {
            CACHE_STORE_ERRORS.inc();
            warn!(key = %key, error = %e, "cache write failed");
        }
        Ok(fresh)
    }

    // Best-effort removal; used after mutations.
    pub async fn invalidate(&self, key: &ResourceKey) {
        match self.store.delete(key).await {
            Ok(()) => debug!(key = %key, "cache entry invalidated"),
            Err(e) => {
                CACHE_STORE_ERRORS.inc();
                warn!(key = %key, error = %e, "cache invalidation failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &ResourceKey) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn set(&self, _key: &ResourceKey, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }

        async fn delete(&self, _key: &ResourceKey) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".to_string()))
        }
    }

    fn counting_fetch(
        calls: &AtomicUsize,
        body: &'static str,
    ) -> impl Future<Output = Result<Vec<u8>, String>> {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok(body.as_bytes().to_vec()) }
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_store() {
        let cache = CacheAside::new(Arc::new(MemoryStore::new()));
        let calls = AtomicUsize::new(0);
        let key = ResourceKey::products();
        let ttl = Duration::from_secs(30);

        let first = cache
            .get_or_populate(&key, ttl, || counting_fetch(&calls, "one"))
            .await
            .unwrap();
        let second = cache
            .get_or_populate(&key, ttl, || counting_fetch(&calls, "two"))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(second, b"one");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refetched() {
        let cache = CacheAside::new(Arc::new(MemoryStore::new()));
        let calls = AtomicUsize::new(0);
        let key = ResourceKey::product_by_id("123");
        let ttl = Duration::from_secs(30);

        cache
            .get_or_populate(&key, ttl, || counting_fetch(&calls, "old"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        let refreshed = cache
            .get_or_populate(&key, ttl, || counting_fetch(&calls, "new"))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed, b"new");
    }

    #[tokio::test]
    async fn fetch_failure_propagates_and_is_not_stored() {
        let store = Arc::new(MemoryStore::new());
        let cache = CacheAside::new(store.clone());
        let key = ResourceKey::products();

        let result: Result<Vec<u8>, String> = cache
            .get_or_populate(&key, Duration::from_secs(30), || async {
                Err("upstream down".to_string())
            })
            .await;

        assert_eq!(result.unwrap_err(), "upstream down");
        assert!(store.is_empty());
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn broken_store_still_returns_fetched_value() {
        let cache = CacheAside::new(Arc::new(BrokenStore));
        let calls = AtomicUsize::new(0);
        let key = ResourceKey::products();

        let value = cache
            .get_or_populate(&key, Duration::from_secs(30), || counting_fetch(&calls, "fresh"))
            .await
            .unwrap();

        assert_eq!(value, b"fresh");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // invalidation against a broken store is swallowed
        cache.invalidate(&key).await;
    }

    #[tokio::test]
    async fn invalidate_forces_next_fetch() {
        let cache = CacheAside::new(Arc::new(MemoryStore::new()));
        let calls = AtomicUsize::new(0);
        let key = ResourceKey::product_by_handle("red-dress");
        let ttl = Duration::from_secs(30);

        cache
            .get_or_populate(&key, ttl, || counting_fetch(&calls, "a"))
            .await
            .unwrap();
        cache.invalidate(&key).await;
        cache
            .get_or_populate(&key, ttl, || counting_fetch(&calls, "b"))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_dropped_on_read() {
        let store = MemoryStore::new();
        let key = ResourceKey::product_by_id("9");

        store.set(&key, b"stale", Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.len(), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unreachable_redis_degrades_to_fetching() {
        // nothing listens on port 1
        let store = RedisStore::new("redis://127.0.0.1:1").unwrap();
        let cache = CacheAside::new(Arc::new(store));
        let calls = AtomicUsize::new(0);
        let key = ResourceKey::products();
        let ttl = Duration::from_secs(30);

        for _ in 0..2 {
            let value = cache
                .get_or_populate(&key, ttl, || counting_fetch(&calls, "fresh"))
                .await
                .unwrap();
            assert_eq!(value, b"fresh");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        cache.invalidate(&key).await;
    }

    #[test]
    fn redis_store_rejects_malformed_url() {
        assert!(matches!(RedisStore::new("not a url"), Err(CacheError::Redis(_))));
    }

    #[test]
    fn resource_keys_are_distinct_per_lookup_kind() {
        assert_ne!(ResourceKey::product_by_id("1"), ResourceKey::product_by_handle("1"));
        assert_ne!(ResourceKey::product_by_id("1"), ResourceKey::product_by_id("12"));
        assert_eq!(ResourceKey::products().as_str(), "catalog:products");
    }
}
