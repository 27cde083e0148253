use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use scout_client::config_manager::Config;
use scout_client::ScoutClient;

use crate::server::DaemonServer;

#[tokio::main]
pub async fn run(config: Config) -> Result<()> {
    let addr: SocketAddr = config.server.parse()?;

    let client = ScoutClient::new(config).context("failed to create scout client")?;

    info!("scout daemon listening on {addr}");
    DaemonServer::bind(Arc::new(client), addr).await?.run().await
}
