use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crm_api::background::mango_poller;
use crm_api::config::ServerConfig;
use crm_api::router::build_app_router;
use crm_api::state::AppState;
use crm_mango::{MangoApi, MangoConfig, RecordingStorageConfig};
use crm_sync::{SyncConfig, SyncService};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "crm_api=debug,crm_sync=debug,crm_mango=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let mango_config = MangoConfig::from_env();
    let storage = RecordingStorageConfig::from_env();
    let sync_config = SyncConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    if !mango_config.is_configured() {
        tracing::warn!("MANGO_API_KEY / MANGO_API_SALT not set; sync passes will fail");
    }

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = crm_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    crm_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    crm_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Recording storage ---
    tokio::fs::create_dir_all(&storage.dir)
        .await
        .expect("Failed to create recordings directory");

    // --- Sync service ---
    let api = Arc::new(MangoApi::new(mango_config.clone()).expect("Failed to build Mango client"));
    let sync = Arc::new(SyncService::new(
        pool.clone(),
        api,
        storage.clone(),
        sync_config.clone(),
    ));

    // --- Background poller ---
    let poller_cancel = CancellationToken::new();
    let poller_handle = sync_config.interval.map(|interval| {
        let sync = Arc::clone(&sync);
        let cancel = poller_cancel.clone();
        tokio::spawn(async move {
            mango_poller::run(sync, interval, cancel).await;
        })
    });
    if poller_handle.is_none() {
        tracing::info!("MANGO_SYNC_INTERVAL_SECS is 0; background polling disabled");
    }

    // --- App state ---
    let state = AppState {
        pool,
        mango: Arc::new(mango_config),
        recordings: Arc::new(storage),
        sync,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    poller_cancel.cancel();
    if let Some(handle) = poller_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        tracing::info!("Mango sync poller stopped");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
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
