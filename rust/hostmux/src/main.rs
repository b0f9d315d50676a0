use anyhow::{Context, Result};
use clap::Parser;
use hostmux::{
    cli::Args,
    config::Config,
    handler::Route,
    listener,
    logging::{self, Priority},
    stats::Stats,
    TcpDialer,
};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_args(Args::parse()).context("parse args")?;
    let logger = logging::init(&cfg.log)?;
    logger.log(Priority::Notice, "hostmux starting");

    let stats = Arc::new(Stats::default());
    let dialer = TcpDialer::new(cfg.connect_timeout);

    // Bind everything first: a port we can't get is fatal before any traffic flows.
    let mut bound = Vec::with_capacity(cfg.listeners.len());
    for l in &cfg.listeners {
        match listener::bind(l.addr).await {
            Ok(sock) => bound.push((l, sock)),
            Err(e) => logger.fatal(format_args!("{e:#}")),
        }
    }

    for (l, sock) in bound {
        let route = Route::new(l.protocol, dialer.clone())
            .with_backend_port(l.backend_port)
            .with_sniff_timeout(cfg.sniff_timeout);
        tokio::spawn(listener::serve(sock, Arc::new(route), logger, stats.clone()));
    }

    signal::ctrl_c().await?;
    logger.logf(Priority::Notice, format_args!("shutting down: {}", stats.snapshot()));
    Ok(())
}
