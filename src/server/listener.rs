use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{Instrument, info};

use crate::config::Config;
use crate::http::connection::{Connection, Limits};
use crate::routes::Router;
use crate::storage::FileStore;

pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server.listen_addr))?;
    info!("Listening on {}", cfg.server.listen_addr);

    let store = FileStore::new(&cfg.files.directory);
    info!(directory = %store.root().display(), "Serving files");

    let router = Arc::new(Router::new(store));
    serve(listener, router, cfg.limits()).await
}

/// Accepts connections forever, one task per connection.
///
/// A failing connection is logged and dropped; it never stops the loop.
pub async fn serve(listener: TcpListener, router: Arc<Router>, limits: Limits) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        tracing::debug!("Accepted connection from {}", peer);

        let router = router.clone();
        let span = tracing::info_span!("conn", %peer);
        tokio::spawn(
            async move {
                let mut conn = Connection::new(socket, router, limits);
                if let Err(e) = conn.run().await {
                    tracing::error!("Connection error from {}: {:#}", peer, e);
                }
            }
            .instrument(span),
        );
    }
}
