pub mod http;
pub mod tls;

use crate::cursor::ScanBuffer;
use crate::error::SniffError;
use std::fmt;
use tokio::io::AsyncRead;

/// Hostname extracted from a connection plus every byte read to find it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sniffed {
    pub hostname: String,
    /// Must be replayed to the backend verbatim before anything else.
    pub captured: Vec<u8>,
}

pub type SniffOutcome = Result<Sniffed, SniffError>;

/// Front-end protocol variant. Selects the sniffer and the default backend port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plaintext HTTP, routed by the `Host` header.
    Http,
    /// TLS, routed by the ClientHello SNI.
    Https,
}

impl Protocol {
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub async fn sniff<R>(self, reader: &mut R) -> SniffOutcome
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        match self {
            Protocol::Http => http::sniff(reader).await,
            Protocol::Https => tls::sniff(reader).await,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of one scan over the buffered bytes.
#[derive(Debug)]
pub(crate) enum Scan {
    Found(String),
    NeedMore,
}

/// Read-then-rescan loop shared by both sniffers.
///
/// After every read the scanner sees the whole buffer again, so a header or
/// handshake split across arbitrary reads is handled the same as one read.
pub(crate) async fn sniff_with<R, F>(reader: &mut R, mut buf: ScanBuffer, mut scan: F) -> SniffOutcome
where
    R: AsyncRead + Unpin + ?Sized,
    F: FnMut(&ScanBuffer) -> Result<Scan, SniffError>,
{
    loop {
        buf.fill_from(reader).await?;
        match scan(&buf)? {
            Scan::Found(hostname) => {
                return Ok(Sniffed {
                    hostname,
                    captured: buf.into_captured(),
                })
            }
            Scan::NeedMore if buf.is_full() => {
                return Err(SniffError::BufferLimitExceeded(buf.capacity()))
            }
            Scan::NeedMore => {}
        }
    }
}

pub(crate) fn hostname_from(bytes: &[u8]) -> Result<String, SniffError> {
    match std::str::from_utf8(bytes) {
        Ok(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(SniffError::InvalidHostname),
    }
}
