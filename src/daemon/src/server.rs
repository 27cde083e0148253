use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use scout_client::ScoutClient;

use crate::app::get_app;

pub struct DaemonServer {
    client: Arc<ScoutClient>,
    listener: TcpListener,
}

impl DaemonServer {
    pub async fn bind(client: Arc<ScoutClient>, addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind to address {addr}: {e}"))?;
        Ok(Self { client, listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the HTTP surface plus the two background activities: a
    /// registration task retrying at a fixed interval until first success,
    /// and the periodic reconciliation cycle, which only starts ticking once
    /// the registration flag is set.
    pub async fn run(self) -> anyhow::Result<()> {
        let client = self.client.clone();

        let cancellation_token = CancellationToken::new();
        let app = get_app(client.clone(), cancellation_token.clone());
        let server = tokio::spawn(axum::serve(self.listener, app).into_future());

        let (registered_tx, registered_rx) = watch::channel(false);

        let registration_client = client.clone();
        let registration_token = cancellation_token.clone();
        let retry_interval =
            Duration::from_millis(client.config.registration_retry_interval_ms);
        tokio::spawn(async move {
            loop {
                match registration_client.reconciler().register_agent().await {
                    Ok(agent) => {
                        info!("agent registered with id {}", agent.id);
                        let _ = registered_tx.send(true);
                        break;
                    }
                    Err(e) => {
                        info!(
                            "could not register agent: {e}. Backend offline or wrong backend \
                             address? Will retry in {}s",
                            retry_interval.as_secs()
                        );
                    }
                }

                tokio::select! {
                    _ = registration_token.cancelled() => break,
                    _ = tokio::time::sleep(retry_interval) => {}
                }
            }
        });

        let mut refresh_interval = tokio::time::interval(Duration::from_millis(
            client.config.refresh_interval_ms,
        ));

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    debug!("daemon server cancelled");
                    break;
                }
                _ = refresh_interval.tick() => {
                    if *registered_rx.borrow() {
                        client.reconciler().refresh().await;
                    } else {
                        debug!("skipping reconciliation cycle, agent not registered yet");
                    }
                }
            }
        }

        server.abort();
        Ok(())
    }
}
