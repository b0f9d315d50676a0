use crate::dialer::Dialer;
use crate::handler::{ConnectionHandler, Route};
use crate::logging::{Logger, Priority};
use crate::stats::Stats;
use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind tcp listener {addr}"))
}

/// Accept loop for one front-end port. Every connection gets its own task;
/// nothing a connection does can end this loop.
pub async fn serve<D: Dialer>(listener: TcpListener, route: Arc<Route<D>>, logger: Logger, stats: Arc<Stats>) {
    match listener.local_addr() {
        Ok(addr) => logger.logf(Priority::Notice, format_args!("{} listening on {addr}", route.protocol)),
        Err(_) => logger.logf(Priority::Notice, format_args!("{} listening", route.protocol)),
    }

    loop {
        let (sock, peer) = match listener.accept().await {
            Ok(x) => x,
            Err(e) => {
                logger.logf(Priority::Err, format_args!("{} accept failed: {e}", route.protocol));
                // Usually fd exhaustion; don't spin on it.
                tokio::time::sleep(Duration::from_millis(50)).await;
                continue;
            }
        };
        let _ = sock.set_nodelay(true);

        let id = stats.next_conn_id();
        stats.conn_opened();
        let handler = ConnectionHandler::new(id, Some(peer), sock, route.clone(), logger, stats.clone());
        let st = stats.clone();
        tokio::spawn(async move {
            handler.run().await;
            st.conn_closed();
        });
    }
}
