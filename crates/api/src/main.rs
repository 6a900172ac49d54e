use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use swarm_api::config::{BusBackend, ServerConfig, StoreBackend};
use swarm_api::router::build_app_router;
use swarm_api::state::AppState;
use swarm_core::retry::retry_fixed;
use swarm_db::{JobStore, MemoryJobStore, PgJobStore};
use swarm_events::{BackgroundPublisher, BroadcastHub, MemoryBus, MessageBus, RedisBus};
use swarm_worker::JobRelayWorker;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "swarm_api=debug,swarm_worker=debug,swarm_events=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        store = ?config.store_backend,
        bus = ?config.bus_backend,
        "Loaded server configuration",
    );

    let store = connect_store(&config).await?;
    let bus = connect_bus(&config).await?;

    let (hub, hub_handle) = BroadcastHub::spawn(config.hub.clone());
    tracing::info!(
        write_timeout_ms = config.hub.write_timeout.as_millis() as u64,
        "Broadcast hub started",
    );

    // --- Background work ---
    let background_cancel = CancellationToken::new();
    let publisher = BackgroundPublisher::new(
        Arc::clone(&bus),
        config.publish_timeout,
        background_cancel.clone(),
    );

    let relay_cancel = CancellationToken::new();
    let mut relay_handle = JobRelayWorker::new(Arc::clone(&store), Arc::clone(&bus), hub.clone())
        .with_resubscribe(config.startup_retry.clone())
        .start(relay_cancel.clone())
        .await
        .context("Failed to start job relay")?;

    // --- HTTP server ---
    let config = Arc::new(config);
    let state = AppState {
        store,
        hub: hub.clone(),
        publisher,
        config: Arc::clone(&config),
    };
    let app = build_app_router(state, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    tracing::info!("Starting server on {addr}");

    let shutdown_hub = hub.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Close observer sockets so live WebSocket connections do not
            // hold the server open.
            let closed = shutdown_hub.close_all().await;
            tracing::info!(closed, "Closed WebSocket observers");
        })
        .into_future();

    // The relay only ends on its own once resubscribing is exhausted.
    tokio::select! {
        served = server => served.context("Server error")?,
        relayed = &mut relay_handle => {
            background_cancel.cancel();
            hub.close_all().await;
            return match relayed {
                Ok(Err(e)) => Err(anyhow::Error::new(e).context("Job relay stopped")),
                Ok(Ok(())) => Err(anyhow::anyhow!("Job relay stopped unexpectedly")),
                Err(e) => Err(anyhow::Error::new(e).context("Job relay task failed")),
            };
        }
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    relay_cancel.cancel();
    if tokio::time::timeout(config.shutdown_timeout, relay_handle)
        .await
        .is_err()
    {
        tracing::warn!("Job relay did not stop within the shutdown timeout");
    }
    tracing::info!("Job relay stopped");

    background_cancel.cancel();

    hub.close_all().await;
    drop(hub);
    let _ = tokio::time::timeout(config.shutdown_timeout, hub_handle).await;
    tracing::info!("Broadcast hub stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Build the configured job store, retrying the initial connection.
async fn connect_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn JobStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let pool = retry_fixed(&config.startup_retry, "database", || {
                swarm_db::create_pool(&config.database_url)
            })
            .await
            .context("Failed to connect to database")?;
            tracing::info!("Database connection pool created");

            swarm_db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");

            Ok(Arc::new(PgJobStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory job store, jobs will not survive a restart");
            Ok(Arc::new(MemoryJobStore::new()))
        }
    }
}

/// Build the configured message bus, retrying the initial connection.
async fn connect_bus(config: &ServerConfig) -> anyhow::Result<Arc<dyn MessageBus>> {
    match config.bus_backend {
        BusBackend::Redis => {
            let bus = retry_fixed(&config.startup_retry, "redis", || {
                RedisBus::connect(&config.redis_url)
            })
            .await
            .context("Failed to connect to Redis")?;
            Ok(Arc::new(bus))
        }
        BusBackend::Memory => {
            tracing::warn!("Using in-memory message bus, no external workers will see jobs");
            Ok(Arc::new(MemoryBus::default()))
        }
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
