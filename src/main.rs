use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_gateway::config::Settings;
use storefront_gateway::routes::router;
use storefront_gateway::state::AppState;

#[tokio::main]
async fn main() {
    // a missing .env is fine, the environment may already carry everything
    let _ = dotenv::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();
    let origins = settings.origins();
    if origins.is_empty() {
        error!("ALLOWED_ORIGINS must list at least one origin");
        std::process::exit(1);
    }

    let state = match AppState::from_settings(&settings).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!(error = %e, "failed to initialise cache store");
            std::process::exit(1);
        }
    };

    let app = router(state, &origins);

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(port = settings.port, "gateway running");
    info!(origins = ?origins, "CORS origins");
    info!(ttl_secs = settings.cache_ttl, "catalog cache TTL");

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
