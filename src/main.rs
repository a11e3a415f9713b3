use anyhow::Result;
use btcpay_monitor::{
    config::Config,
    handlers::{router, AppState},
    services::{CacheService, PaymentService, WalletService},
    telemetry,
};
use std::{sync::Arc, time::Instant};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting btcpay-server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    // Initialize services
    let provider = config.build_provider()?;
    let cache = Arc::new(CacheService::new(config.height_cache_ttl));
    let payments = Arc::new(PaymentService::new(
        provider.clone(),
        cache,
        config.min_confirmations,
    ));
    let wallets = Arc::new(WalletService::new(config.network));

    let state = AppState {
        payments,
        wallets,
        provider: provider.clone(),
        network: config.network,
        started_at: Instant::now(),
    };

    let app = router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Network: {} via {}", config.network, provider.name());
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl+c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down gracefully...");
}
