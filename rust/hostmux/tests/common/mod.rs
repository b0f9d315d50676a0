#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Options for [`client_hello`].
#[derive(Clone, Debug)]
pub struct HelloSpec {
    pub host: String,
    pub cipher_suites: usize,
    pub padding: usize,
    /// Bytes inside the record after the extensions block.
    pub trailing: Vec<u8>,
}

impl HelloSpec {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            cipher_suites: 2,
            padding: 0,
            trailing: Vec::new(),
        }
    }
}

/// Builds a single TLS record carrying a ClientHello with one SNI host_name.
pub fn client_hello(spec: &HelloSpec) -> Vec<u8> {
    let host = spec.host.as_bytes();

    let mut sni = Vec::new();
    sni.extend_from_slice(&((3 + host.len()) as u16).to_be_bytes());
    sni.push(0x00);
    sni.extend_from_slice(&(host.len() as u16).to_be_bytes());
    sni.extend_from_slice(host);

    let mut exts = Vec::new();
    if spec.padding > 0 {
        exts.extend_from_slice(&0x0015u16.to_be_bytes());
        exts.extend_from_slice(&(spec.padding as u16).to_be_bytes());
        exts.extend(std::iter::repeat(0u8).take(spec.padding));
    }
    exts.extend_from_slice(&0x0000u16.to_be_bytes());
    exts.extend_from_slice(&(sni.len() as u16).to_be_bytes());
    exts.extend_from_slice(&sni);

    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(&[0x5a; 32]);
    body.push(0);
    body.extend_from_slice(&((spec.cipher_suites * 2) as u16).to_be_bytes());
    for i in 0..spec.cipher_suites {
        body.extend_from_slice(&(0x1301u16.wrapping_add(i as u16)).to_be_bytes());
    }
    body.extend_from_slice(&[1, 0]);
    body.extend_from_slice(&(exts.len() as u16).to_be_bytes());
    body.extend_from_slice(&exts);
    body.extend_from_slice(&spec.trailing);

    let mut hs = vec![0x01];
    hs.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    hs.extend_from_slice(&body);

    let mut record = vec![0x16, 0x03, 0x01];
    record.extend_from_slice(&(hs.len() as u16).to_be_bytes());
    record.extend_from_slice(&hs);
    record
}

/// Reader that hands out `data` in the given chunk sizes (cycled), then EOF.
pub struct Chunked {
    data: Vec<u8>,
    pos: usize,
    sizes: Vec<usize>,
    next: usize,
}

impl Chunked {
    pub fn new(data: Vec<u8>, sizes: Vec<usize>) -> Self {
        assert!(!sizes.is_empty());
        Self { data, pos: 0, sizes, next: 0 }
    }

    pub fn whole(data: Vec<u8>) -> Self {
        Self::new(data, vec![usize::MAX])
    }
}

impl AsyncRead for Chunked {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pos >= this.data.len() {
            return Poll::Ready(Ok(()));
        }
        let size = this.sizes[this.next % this.sizes.len()].max(1);
        this.next += 1;
        let n = size.min(this.data.len() - this.pos).min(buf.remaining());
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

pub fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(fut)
}
