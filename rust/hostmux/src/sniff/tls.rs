//! SNI extraction from a raw TLS ClientHello record.
//!
//! Record layout:
//!   ContentType(1) | Version(2) | Length(2) | Handshake...
//!
//! Handshake (ClientHello):
//!   Type(1) | Length(3) | Version(2) | Random(32) | SessionID(u8 len) |
//!   CipherSuites(u16 len) | CompressionMethods(u8 len) | Extensions(u16 len)
//!
//! server_name extension (type 0x0000):
//!   ListLength(2) | { NameType(1) | NameLength(2) | Name } ...
//!
//! Only the first record is looked at. Nothing is decrypted or answered.

use super::{hostname_from, sniff_with, Scan, SniffOutcome};
use crate::cursor::{Cursor, ScanBuffer};
use crate::error::SniffError;
use tokio::io::AsyncRead;

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const MIN_MAJOR_VERSION: u8 = 3;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const EXTENSION_SERVER_NAME: u16 = 0x0000;
const NAME_TYPE_HOST_NAME: u8 = 0x00;

const RECORD_HEADER_LEN: usize = 5;
/// Type, 3-byte length, version and random.
const CLIENT_HELLO_FIXED_LEN: usize = 1 + 3 + 2 + 32;

/// Reads from `reader` until a complete first record is buffered, then
/// returns the first SNI host_name it carries.
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
    sniff_with(reader, buf, |buf| scan(buf.filled(), buf.capacity())).await
}

fn scan(buf: &[u8], capacity: usize) -> Result<Scan, SniffError> {
    let Some(&content_type) = buf.first() else {
        return Ok(Scan::NeedMore);
    };
    if content_type != CONTENT_TYPE_HANDSHAKE {
        return Err(SniffError::NotHandshake(content_type));
    }
    if let Some(&major) = buf.get(1) {
        if major < MIN_MAJOR_VERSION {
            return Err(SniffError::IncompatibleVersion(major));
        }
    }
    if buf.len() < RECORD_HEADER_LEN {
        return Ok(Scan::NeedMore);
    }

    let mut header = Cursor::new(buf);
    header.skip(3)?;
    let record_len = RECORD_HEADER_LEN + usize::from(header.read_u16_be()?);
    if record_len > capacity {
        // The record can never be fully buffered.
        return Err(SniffError::BufferLimitExceeded(capacity));
    }
    if buf.len() < record_len {
        return Ok(Scan::NeedMore);
    }

    server_name(&buf[..record_len]).map(Scan::Found)
}

/// Parses one complete record. Any length running past the record is final.
fn server_name(record: &[u8]) -> Result<String, SniffError> {
    let mut c = Cursor::new(record);
    c.skip(RECORD_HEADER_LEN)?;

    let msg_type = c.read_u8()?;
    if msg_type != HANDSHAKE_CLIENT_HELLO {
        return Err(SniffError::NotClientHello(msg_type));
    }
    c.skip(CLIENT_HELLO_FIXED_LEN - 1)?;

    c.skip_u8_prefixed()?; // session id
    c.skip_u16_prefixed()?; // cipher suites
    c.skip_u8_prefixed()?; // compression methods

    if c.is_empty() {
        return Err(SniffError::NoExtensions);
    }
    let extensions_len = c.read_u16_be()?;
    let mut extensions = c.sub(usize::from(extensions_len))?;

    while !extensions.is_empty() {
        let ext_type = extensions.read_u16_be()?;
        let ext_len = extensions.read_u16_be()?;
        let mut payload = extensions.sub(usize::from(ext_len))?;
        if ext_type == EXTENSION_SERVER_NAME {
            if let Some(name) = host_name(&mut payload)? {
                return Ok(name);
            }
        }
    }
    Err(SniffError::NoServerName)
}

fn host_name(payload: &mut Cursor<'_>) -> Result<Option<String>, SniffError> {
    let list_len = payload.read_u16_be()?;
    let mut list = payload.sub(usize::from(list_len))?;
    while !list.is_empty() {
        let name_type = list.read_u8()?;
        let name_len = list.read_u16_be()?;
        let name = list.read_bytes(usize::from(name_len))?;
        if name_type == NAME_TYPE_HOST_NAME {
            return hostname_from(name).map(Some);
        }
    }
    Ok(None)
}
