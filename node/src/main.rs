use axum::serve;
use readclub_node::storage::NodeStorage;
use readclub_node::{init_tracing, router, AppConfig, AppState};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let storage = NodeStorage::open(&config.storage_path)?;
    let state = AppState::new(config.clone(), storage);

    let app = router(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!(%local_addr, build_id = %config.build_id, "starting readclub node service");

    serve(listener, app).await?;
    Ok(())
}
