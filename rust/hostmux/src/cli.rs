use crate::logging::Priority;
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};

#[derive(Clone, Debug, Parser)]
#[command(
    name = "hostmux",
    about = "Transparent TCP proxy routing by HTTP Host header or TLS SNI",
    long_about = "hostmux accepts plaintext HTTP and TLS connections, reads just enough of the first bytes to \
learn the requested hostname (Host header / ClientHello SNI) and splices the connection to that host on the \
same port. Nothing is decrypted or terminated.",
    after_help = r#"LOG LEVELS
  EMERG ALERT CRIT ERR WARNING NOTICE INFO DEBUG (case-insensitive)

NOTES
  * Binding ports 80/443 usually needs root or CAP_NET_BIND_SERVICE.
  * Timeouts default to 0 (disabled): a silent client can hold a connection
    open until it goes away. Set --sniff-timeout to bound the sniff phase.
"#
)]
pub struct Args {
    /// File for log messages (appended to)
    #[arg(long, default_value = "/var/log/hostmux.log")]
    pub logfile: PathBuf,

    /// Minimum log level
    #[arg(long, default_value = "DEBUG")]
    pub loglevel: Priority,

    /// Also write log records to stderr
    #[arg(long, default_value_t = false)]
    pub log_stderr: bool,

    #[arg(long, default_value = "0.0.0.0:80")]
    pub http_listen: SocketAddr,
    #[arg(long, default_value = "0.0.0.0:443")]
    pub https_listen: SocketAddr,

    #[arg(long, default_value_t = 80)]
    pub http_backend_port: u16,
    #[arg(long, default_value_t = 443)]
    pub https_backend_port: u16,

    #[arg(long, default_value_t = 0, help = "Seconds allowed for sniffing the hostname (0 disables)")]
    pub sniff_timeout: u64,
    #[arg(long, default_value_t = 0, help = "Seconds allowed for connecting to the backend (0 disables)")]
    pub connect_timeout: u64,
}
