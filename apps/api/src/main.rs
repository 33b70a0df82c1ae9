use std::io::ErrorKind;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use monitoring_cell::ENDPOINTS;
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting gateway monitor API server");

    // Load configuration
    let config = AppConfig::from_env();

    // Build the application router
    let app = router::create_router(&config).layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    );

    let listener = bind(&config.host, config.port).await?;
    let addr = listener.local_addr()?;
    info!("Listening on http://{}", addr);
    for endpoint in ENDPOINTS {
        info!("  http://{}{}", addr, endpoint);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

/// Binds `host:port`, trying `port + 1` once if the port is taken.
async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    match TcpListener::bind((host, port)).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            let fallback = port.checked_add(1).context("no fallback port above 65535")?;
            warn!("Port {} in use, trying {}", port, fallback);
            TcpListener::bind((host, fallback))
                .await
                .with_context(|| format!("failed to bind {}:{}", host, fallback))
        }
        Err(e) => Err(e).with_context(|| format!("failed to bind {}:{}", host, port)),
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await
        }
    }
}
