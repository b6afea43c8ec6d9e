//! Binary entrypoint: reads environment configuration, builds the router,
//! and serves it over a `tracing_subscriber` registry with an env-filter,
//! using `axum::serve` over a `TcpListener`.

use medsim_api::{build_router, ApiState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = medsim_api::AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(ApiState::new(config));
    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bind_addr, "medsim-api listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server exited with an error");
        std::process::exit(1);
    }
}
