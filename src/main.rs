use tokio::sync::watch;

use marketcore::api::router::create_router;
use marketcore::config::AppConfig;
use marketcore::services::timeout_sweeper::run_timeout_sweeper;
use marketcore::{db, metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connected");

    db::run_migrations(&pool).await?;
    tracing::info!("Migrations applied");

    let metrics_handle = metrics::init_metrics();
    let state = AppState::new(pool, config, metrics_handle);

    // --- Background sweeper: deposit expiry, withdrawal reassignment, tontine ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = if state.config.sweeper_enabled {
        let sweeper = state.sweeper.clone();
        let interval_secs = state.config.sweep_interval_secs;
        tracing::info!(
            interval_secs,
            deposit_timeout_secs = state.config.deposit_timeout_secs,
            withdrawal_window_secs = state.config.withdrawal_agent_window_secs,
            "Spawning timeout sweeper"
        );
        Some(tokio::spawn(async move {
            run_timeout_sweeper(sweeper, interval_secs, shutdown_rx).await;
        }))
    } else {
        tracing::info!("Timeout sweeper disabled (SWEEPER_ENABLED=false)");
        None
    };

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight sweep finish before exiting.
    let _ = shutdown_tx.send(true);
    if let Some(task) = sweeper_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Sweeper task panicked");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}
