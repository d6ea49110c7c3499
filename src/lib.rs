pub mod cache;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod query;
pub mod routes;
pub mod seed;
pub mod state;
