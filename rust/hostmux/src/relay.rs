//! Two-way splice between two connected streams.
//!
//! Each direction runs on its own task. Whichever direction stops first
//! fires the pair's close signal, which stops the other one; both streams
//! are closed once both tasks have dropped their halves.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub const RELAY_CHUNK_SIZE: usize = 2048;

/// Bytes moved in each direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub a_to_b: u64,
    pub b_to_a: u64,
}

/// Fires the close signal when dropped, whatever the exit path.
struct CloseOnDrop(CancellationToken);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        // Cancelling twice is a no-op.
        self.0.cancel();
    }
}

/// Copies `a` to `b` and `b` to `a` until either direction stops.
pub async fn relay<A, B>(a: A, b: B) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send + 'static,
    B: AsyncRead + AsyncWrite + Send + 'static,
{
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);

    let close = CancellationToken::new();
    // If this future is dropped the pumps must not outlive it.
    let _close = CloseOnDrop(close.clone());

    let up = tokio::spawn(pump(a_read, b_write, close.clone()));
    let down = tokio::spawn(pump(b_read, a_write, close.clone()));
    let (up, down) = tokio::join!(up, down);

    RelayStats {
        a_to_b: up.unwrap_or_default(),
        b_to_a: down.unwrap_or_default(),
    }
}

async fn pump<R, W>(mut src: R, mut dst: W, close: CancellationToken) -> u64
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let _close = CloseOnDrop(close.clone());
    let mut buf = vec![0u8; RELAY_CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = tokio::select! {
            _ = close.cancelled() => break,
            res = src.read(&mut buf) => match res {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            },
        };
        tokio::select! {
            _ = close.cancelled() => break,
            res = dst.write_all(&buf[..n]) => if res.is_err() { break },
        }
        total += n as u64;
    }

    // Shutting down an already closed stream just errors; nobody cares.
    let _ = dst.shutdown().await;
    total
}
