//! Transparent TCP proxy that picks a backend by sniffing the HTTP `Host`
//! header or the TLS ClientHello SNI, then splices the raw bytes through.

pub mod cli;
pub mod config;
pub mod cursor;
pub mod dialer;
pub mod error;
pub mod handler;
pub mod listener;
pub mod logging;
pub mod relay;
pub mod sniff;
pub mod stats;

pub use dialer::{Dialer, TcpDialer};
pub use error::{ConnError, SniffError};
pub use handler::{ConnReport, ConnState, ConnectionHandler, Route};
pub use logging::{Logger, Priority};
pub use relay::{relay, RelayStats, RELAY_CHUNK_SIZE};
pub use sniff::{Protocol, SniffOutcome, Sniffed};
pub use stats::Stats;
