use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use device_stream_server::config::{Settings, StoreBackend};
use device_stream_server::logging::init_logger;
use device_stream_server::services::HttpDeviceFeed;
use device_stream_server::session::{MemorySessionStore, PgSessionStore, SessionStore};
use device_stream_server::tokens::TokenManager;
use device_stream_server::utils::PeriodicTask;
use device_stream_server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    let _log_guard = init_logger(&settings.logging)?;

    info!("🚀 Starting Device Stream Server...");
    info!("✅ Configuration loaded");

    if settings.device_feed.api_key.is_empty() {
        warn!("DEVICE_FEED_API_KEY is not set, device frames will carry errors");
    }

    // Session store
    let session_ttl = settings.session.ttl();
    let (sessions, pg_store): (Arc<dyn SessionStore>, Option<Arc<PgSessionStore>>) =
        match settings.database.backend {
            StoreBackend::Postgres => {
                let store = Arc::new(PgSessionStore::connect(&settings.database, session_ttl).await?);
                info!("✅ Database connection established");
                (store.clone(), Some(store))
            }
            StoreBackend::Memory => {
                warn!("Using in-memory session store, sessions will not survive a restart");
                (Arc::new(MemorySessionStore::new(session_ttl)), None)
            }
        };

    let purger = spawn_purger(
        sessions.clone(),
        Duration::from_secs(settings.database.purge_interval_seconds.max(1)),
    );

    // Token registry
    let tokens = TokenManager::new();
    let sweeper = tokens.spawn_sweeper(settings.tokens.sweep_interval());
    info!("✅ Token sweeper started");

    let feed = Arc::new(HttpDeviceFeed::new(&settings.device_feed)?);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let state = AppState::new(settings, sessions, tokens, feed);
    let app = build_router(state);

    info!("🎯 Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!("HTTP server error: {}", e);
    }

    sweeper.shutdown().await;
    purger.shutdown().await;
    if let Some(store) = pg_store {
        store.close().await;
    }

    info!("👋 Device Stream Server stopped");
    Ok(())
}

/// Deletes expired session records on a fixed schedule.
fn spawn_purger(sessions: Arc<dyn SessionStore>, interval: Duration) -> PeriodicTask {
    PeriodicTask::spawn("session-purge", interval, move || {
        let sessions = sessions.clone();
        async move {
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!("Purged {} expired sessions", removed),
                Err(e) => warn!("Session purge failed: {}", e),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
