//! ACA Chile inscriptions server.
//!
//! This binary:
//! - Connects to `PostgreSQL` and applies migrations
//! - Connects to Redis for the listing cache and sessions
//! - Exposes Prometheus metrics on `METRICS_PORT`
//! - Serves the HTTP API until Ctrl+C or SIGTERM
//!
//! # Usage
//!
//! ```bash
//! docker compose up -d
//! cargo run --bin server
//! ```

use aca_core::environment::SystemClock;
use aca_inscriptions::auth::{RedisSessionVerifier, SessionVerifier};
use aca_inscriptions::cache::{CacheInvalidator, ListingCache, RedisListingCache};
use aca_inscriptions::metrics::register_metrics;
use aca_inscriptions::server::{build_router, shutdown_signal, AppState};
use aca_inscriptions::store::{PostgresRegistrationStore, RegistrationStore};
use aca_inscriptions::{CancellationPolicy, Config, EventListingService, InscriptionService};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,aca_inscriptions=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ACA Chile inscriptions server...");

    let config = Config::from_env();
    tracing::info!(
        bind = %config.bind_address(),
        listing_ttl_secs = config.cache.listing_ttl_secs,
        legacy_sweep = config.cache.legacy_sweep,
        staff_override = config.inscriptions.staff_override,
        "Configuration loaded"
    );

    // Metrics
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.server.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    register_metrics();
    tracing::info!(address = %metrics_addr, "Metrics exporter listening");

    // Storage
    let postgres = PostgresRegistrationStore::connect(
        &config.postgres.url,
        config.postgres.max_connections,
        Duration::from_secs(config.postgres.connect_timeout),
    )
    .await
    .context("failed to connect to PostgreSQL")?;
    postgres.migrate().await.context("failed to run migrations")?;
    tracing::info!("PostgreSQL connected, migrations applied");

    let cache = RedisListingCache::connect(&config.redis.url)
        .await
        .context("failed to connect listing cache to Redis")?;
    let sessions = RedisSessionVerifier::connect(&config.redis.url)
        .await
        .context("failed to connect session store to Redis")?;
    tracing::info!("Redis connected");

    // Services
    let store: Arc<dyn RegistrationStore> = Arc::new(postgres);
    let cache: Arc<dyn ListingCache> = Arc::new(cache);
    let sessions: Arc<dyn SessionVerifier> = Arc::new(sessions);

    let inscriptions = InscriptionService::new(
        Arc::clone(&store),
        CacheInvalidator::new(Arc::clone(&cache), config.cache.legacy_sweep),
        CancellationPolicy::from_staff_override(config.inscriptions.staff_override),
        Arc::new(SystemClock),
    );
    let listing = EventListingService::new(store, cache, config.listing_ttl());
    let state = AppState::new(inscriptions, listing, sessions);

    let app = build_router(state, &config.cors);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(address = %addr, "Server listening");

    // Serve until a signal arrives, then give in-flight requests the shutdown
    // timeout to finish.
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(());
        })
        .into_future();

    let grace = Duration::from_secs(config.server.shutdown_timeout);
    tokio::select! {
        result = server => result.context("server error")?,
        () = async {
            let _ = stop_rx.await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(timeout_secs = grace.as_secs(), "Shutdown timeout elapsed, exiting");
        },
    }

    tracing::info!("Server stopped");
    Ok(())
}
