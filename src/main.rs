use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use rustytcx::{build_app_with_state, config::Config, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVICTION_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rustytcx=debug,tower_http=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let state = AppState::new();

    let eviction_state = state.clone();
    let download_ttl = config.download_ttl;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(EVICTION_INTERVAL).await;
            eviction_state.evict_expired(download_ttl);
        }
    });

    let app = build_app_with_state(state)
        .layer(axum::extract::DefaultBodyLimit::max(config.max_file_size));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, %err, "failed to bind address");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("listening on {}", addr);

    if let Err(err) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!(%err, "server crashed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
