use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("gateway_requests_total", "Total number of requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("gateway_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("gateway_cache_misses_total", "Total cache misses").unwrap();
    pub static ref CACHE_STORE_ERRORS: Counter = register_counter!(
        "gateway_cache_store_errors_total",
        "Cache store reads, writes or deletes that failed"
    )
    .unwrap();
    pub static ref UPSTREAM_CALLS: CounterVec = register_counter_vec!(
        "gateway_upstream_calls_total",
        "Calls made to upstream services",
        &["upstream", "outcome"]
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "gateway_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("gateway_cache_size", "Current number of items in the in-process cache").unwrap();
}
