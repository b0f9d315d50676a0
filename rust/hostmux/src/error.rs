//! Error types for sniffing and per-connection handling.
//!
//! Everything here stays inside the connection task that produced it: it is
//! logged and the connection is closed. Startup errors use `anyhow` instead.

use std::io;
use thiserror::Error;

/// Why a sniffer could not extract a target hostname.
#[derive(Debug, Error)]
pub enum SniffError {
    /// Reading from the client failed (EOF and timeouts included).
    #[error("read failed: {0}")]
    ReadFailure(#[source] io::Error),

    /// First record byte is not the TLS Handshake content type.
    #[error("not a TLS handshake record (content type {0:#04x})")]
    NotHandshake(u8),

    /// Record major version below SSL 3.
    #[error("incompatible TLS major version {0}")]
    IncompatibleVersion(u8),

    /// Handshake message is not a ClientHello.
    #[error("handshake message is not a ClientHello (type {0:#04x})")]
    NotClientHello(u8),

    /// A declared length reaches past the available bytes.
    #[error("insufficient data: {needed} bytes at offset {offset}, {available} available")]
    InsufficientData {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("ClientHello carries no extensions")]
    NoExtensions,

    #[error("ClientHello carries no server_name host entry")]
    NoServerName,

    #[error("no Host header before end of request headers")]
    NoHostHeader,

    /// Scan buffer filled up without reaching a decision.
    #[error("buffer limit of {0} bytes exceeded")]
    BufferLimitExceeded(usize),

    #[error("sniffed hostname is empty or not valid UTF-8")]
    InvalidHostname,
}

impl SniffError {
    pub(crate) fn eof() -> Self {
        SniffError::ReadFailure(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "client closed before a hostname was found",
        ))
    }
}

/// Failure of one proxied connection.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("sniff failed: {0}")]
    Sniff(#[from] SniffError),

    #[error("dial {target} failed: {source}")]
    DialFailure {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("write of captured prefix failed: {0}")]
    WriteFailure(#[source] io::Error),
}
