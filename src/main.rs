use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use walk_dashboard::{api::HttpWalkApi, router, session::SessionStore, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    let api = HttpWalkApi::from_config(&config)?;
    let session = SessionStore::open(config.session_path.clone()).await;
    let state = AppState::new(Arc::new(api), session);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(api = %config.api_base_url, "listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
