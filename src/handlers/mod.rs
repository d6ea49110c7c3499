mod catalog;
mod chat;
mod health;
mod metrics;

pub use catalog::{list_products_handler, product_by_handle_handler, product_by_id_handler, update_metafield_handler};
pub use chat::chat_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
