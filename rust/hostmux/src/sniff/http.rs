//! `Host` header extraction from a plaintext HTTP request prefix.

use super::{hostname_from, sniff_with, Scan, SniffOutcome};
use crate::cursor::ScanBuffer;
use crate::error::SniffError;
use regex::bytes::Regex;
use std::sync::LazyLock;
use tokio::io::AsyncRead;

// Case-sensitive, first match wins. `-u` lets `.` match any byte but '\n'.
static HOST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m-u)^Host: (.+)\r\n").expect("host line regex"));

const HEADER_END: &[u8] = b"\r\n\r\n";

/// Reads from `reader` until a `Host:` line or the end of the request headers.
pub async fn sniff<R>(reader: &mut R) -> SniffOutcome
where
    R: AsyncRead + Unpin + ?Sized,
{
    sniff_into(reader, ScanBuffer::new()).await
}

pub(crate) async fn sniff_into<R>(reader: &mut R, buf: ScanBuffer) -> SniffOutcome
where
    R: AsyncRead + Unpin + ?Sized,
{
    sniff_with(reader, buf, |buf| scan(buf.filled())).await
}

fn scan(buf: &[u8]) -> Result<Scan, SniffError> {
    let header_end = buf.windows(HEADER_END.len()).position(|w| w == HEADER_END);

    // Only the header section counts; keep the CRLF ending the last header line.
    let headers = match header_end {
        Some(i) => &buf[..i + 2],
        None => buf,
    };

    if let Some(value) = HOST_LINE.captures(headers).and_then(|c| c.get(1)) {
        return hostname_from(value.as_bytes()).map(Scan::Found);
    }
    if header_end.is_some() {
        return Err(SniffError::NoHostHeader);
    }
    Ok(Scan::NeedMore)
}
