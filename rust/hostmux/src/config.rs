use crate::cli::Args;
use crate::logging::LogConfig;
use crate::sniff::Protocol;
use anyhow::{bail, Result};
use std::{net::SocketAddr, time::Duration};

/// One front-end listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    pub protocol: Protocol,
    pub addr: SocketAddr,
    pub backend_port: u16,
}

/// Startup configuration. Built once from the command line, read-only afterwards.
#[derive(Clone, Debug)]
pub struct Config {
    pub log: LogConfig,
    pub listeners: Vec<ListenerConfig>,
    pub sniff_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Config {
    pub fn from_args(a: Args) -> Result<Self> {
        if a.http_listen == a.https_listen {
            bail!("--http-listen and --https-listen must differ (both {})", a.http_listen);
        }
        if a.http_backend_port == 0 || a.https_backend_port == 0 {
            bail!("backend ports must be non-zero");
        }

        Ok(Self {
            log: LogConfig {
                file: a.logfile,
                min_priority: a.loglevel,
                stderr: a.log_stderr,
            },
            listeners: vec![
                ListenerConfig {
                    protocol: Protocol::Http,
                    addr: a.http_listen,
                    backend_port: a.http_backend_port,
                },
                ListenerConfig {
                    protocol: Protocol::Https,
                    addr: a.https_listen,
                    backend_port: a.https_backend_port,
                },
            ],
            sniff_timeout: secs(a.sniff_timeout),
            connect_timeout: secs(a.connect_timeout),
        })
    }
}

fn secs(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n))
}
