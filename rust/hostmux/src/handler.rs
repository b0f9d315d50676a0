//! Per-connection state machine: sniff, dial, replay, relay.

use crate::dialer::Dialer;
use crate::error::{ConnError, SniffError};
use crate::logging::{Logger, Priority};
use crate::relay::{relay, RelayStats};
use crate::sniff::{Protocol, SniffOutcome, Sniffed};
use crate::stats::Stats;
use std::{io, net::SocketAddr, sync::Arc, time::Duration};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    Accepted,
    Sniffing,
    Dialing,
    Relaying,
    Closed,
    FailedSniff,
    FailedDial,
}

impl ConnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnState::Closed | ConnState::FailedSniff | ConnState::FailedDial)
    }
}

/// What a listener hands to every connection it accepts.
pub struct Route<D> {
    pub protocol: Protocol,
    pub backend_port: u16,
    pub dialer: D,
    /// None never times out.
    pub sniff_timeout: Option<Duration>,
}

impl<D: Dialer> Route<D> {
    pub fn new(protocol: Protocol, dialer: D) -> Self {
        Self {
            protocol,
            backend_port: protocol.default_port(),
            dialer,
            sniff_timeout: None,
        }
    }

    pub fn with_backend_port(mut self, port: u16) -> Self {
        self.backend_port = port;
        self
    }

    pub fn with_sniff_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sniff_timeout = timeout;
        self
    }
}

/// How a connection ended.
#[derive(Debug)]
pub struct ConnReport {
    pub id: u64,
    pub state: ConnState,
    pub hostname: Option<String>,
    pub result: Result<RelayStats, ConnError>,
}

/// Drives one accepted client through
/// `Accepted -> Sniffing -> Dialing -> Relaying -> Closed`.
///
/// Sniff errors end in `FailedSniff`, dial or prefix-write errors in
/// `FailedDial`. Every exit closes whatever streams are open.
pub struct ConnectionHandler<C, D> {
    id: u64,
    peer: Option<SocketAddr>,
    client: C,
    route: Arc<Route<D>>,
    logger: Logger,
    stats: Arc<Stats>,
    state: ConnState,
    hostname: Option<String>,
}

impl<C, D> ConnectionHandler<C, D>
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    D: Dialer,
{
    pub fn new(
        id: u64,
        peer: Option<SocketAddr>,
        client: C,
        route: Arc<Route<D>>,
        logger: Logger,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            id,
            peer,
            client,
            route,
            logger,
            stats,
            state: ConnState::Accepted,
            hostname: None,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub async fn run(mut self) -> ConnReport {
        let id = self.id;
        let result = match self.connect().await {
            Ok((upstream, prefix_len)) => {
                self.state = ConnState::Relaying;
                self.stats.inc_relayed();
                let moved = relay(self.client, upstream).await;
                self.stats.add_up(moved.a_to_b);
                self.stats.add_down(moved.b_to_a);
                self.state = ConnState::Closed;
                Ok(RelayStats {
                    a_to_b: prefix_len + moved.a_to_b,
                    b_to_a: moved.b_to_a,
                })
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(stats) => self.logger.logf(
                Priority::Info,
                format_args!(
                    "[cid={id}] closed {}: up={}B down={}B",
                    self.hostname.as_deref().unwrap_or("-"),
                    stats.a_to_b,
                    stats.b_to_a
                ),
            ),
            Err(ConnError::Sniff(e)) => self
                .logger
                .logf(Priority::Notice, format_args!("[cid={id}] sniff failed: {e}")),
            Err(e) => self.logger.logf(Priority::Warning, format_args!("[cid={id}] {e}")),
        }

        ConnReport {
            id,
            state: self.state,
            hostname: self.hostname,
            result,
        }
    }

    /// Sniffs, dials and replays the captured prefix. Returns the backend
    /// stream and the number of prefix bytes written to it.
    async fn connect(&mut self) -> Result<(D::Stream, u64), ConnError> {
        let protocol = self.route.protocol;
        self.logger.logf(
            Priority::Debug,
            format_args!(
                "[cid={}] {protocol} connection from {}",
                self.id,
                self.peer.map_or_else(|| "-".to_string(), |p| p.to_string())
            ),
        );

        self.state = ConnState::Sniffing;
        let Sniffed { hostname, captured } = match self.sniff().await {
            Ok(s) => s,
            Err(e) => {
                self.state = ConnState::FailedSniff;
                self.stats.inc_sniff_failed();
                let _ = self.client.shutdown().await;
                return Err(e.into());
            }
        };
        self.hostname = Some(hostname.clone());

        self.state = ConnState::Dialing;
        let port = self.route.backend_port;
        self.logger.logf(
            Priority::Info,
            format_args!("[cid={}] {protocol} -> {hostname}:{port}", self.id),
        );
        let mut upstream = match self.route.dialer.dial(&hostname, port).await {
            Ok(s) => s,
            Err(source) => {
                let target = format!("{hostname}:{port}");
                return Err(self.fail_dial(ConnError::DialFailure { target, source }).await);
            }
        };

        // The backend must see the sniffed bytes first, exactly once.
        if let Err(e) = upstream.write_all(&captured).await {
            let _ = upstream.shutdown().await;
            return Err(self.fail_dial(ConnError::WriteFailure(e)).await);
        }
        let prefix_len = captured.len() as u64;
        self.stats.add_up(prefix_len);
        Ok((upstream, prefix_len))
    }

    async fn sniff(&mut self) -> SniffOutcome {
        let protocol = self.route.protocol;
        match self.route.sniff_timeout {
            Some(t) => tokio::time::timeout(t, protocol.sniff(&mut self.client))
                .await
                .unwrap_or_else(|_| {
                    Err(SniffError::ReadFailure(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no hostname within {t:?}"),
                    )))
                }),
            None => protocol.sniff(&mut self.client).await,
        }
    }

    async fn fail_dial(&mut self, err: ConnError) -> ConnError {
        self.state = ConnState::FailedDial;
        self.stats.inc_dial_failed();
        let _ = self.client.shutdown().await;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};
    use tokio::sync::mpsc;

    #[derive(Clone, Copy)]
    enum Mode {
        Connect,
        Refuse,
        DropPeer,
    }

    /// Hands out in-memory backends; the far end goes to the test.
    struct MemDialer {
        mode: Mode,
        backends: mpsc::UnboundedSender<(String, u16, DuplexStream)>,
    }

    impl Dialer for MemDialer {
        type Stream = DuplexStream;

        async fn dial(&self, host: &str, port: u16) -> io::Result<DuplexStream> {
            match self.mode {
                Mode::Refuse => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
                Mode::DropPeer => Ok(duplex(64).0),
                Mode::Connect => {
                    let (ours, theirs) = duplex(4096);
                    let _ = self.backends.send((host.to_string(), port, theirs));
                    Ok(ours)
                }
            }
        }
    }

    fn handler(
        protocol: Protocol,
        mode: Mode,
        sniff_timeout: Option<Duration>,
    ) -> (
        ConnectionHandler<DuplexStream, MemDialer>,
        DuplexStream,
        mpsc::UnboundedReceiver<(String, u16, DuplexStream)>,
        Arc<Stats>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let route = Route::new(protocol, MemDialer { mode, backends: tx }).with_sniff_timeout(sniff_timeout);
        let (client, test_side) = duplex(4096);
        let stats = Arc::new(Stats::default());
        let h = ConnectionHandler::new(7, None, client, Arc::new(route), Logger::new(Priority::Debug), stats.clone());
        (h, test_side, rx, stats)
    }

    #[test]
    fn starts_accepted() {
        let (h, _client, _rx, _) = handler(Protocol::Http, Mode::Connect, None);
        assert_eq!(h.state(), ConnState::Accepted);
        assert!(!h.state().is_terminal());
    }

    #[tokio::test]
    async fn relays_after_replaying_prefix() {
        const REQ: &[u8] = b"GET /a HTTP/1.1\r\nHost: foo.test\r\n\r\n";
        const RESP: &[u8] = b"HTTP/1.1 204 No Content\r\n\r\n";

        let (h, mut client, mut rx, stats) = handler(Protocol::Http, Mode::Connect, None);
        let task = tokio::spawn(h.run());

        client.write_all(REQ).await.unwrap();
        let (host, port, mut backend) = rx.recv().await.unwrap();
        assert_eq!((host.as_str(), port), ("foo.test", 80));

        let mut got = vec![0u8; REQ.len()];
        backend.read_exact(&mut got).await.unwrap();
        assert_eq!(got, REQ);

        backend.write_all(RESP).await.unwrap();
        let mut got = vec![0u8; RESP.len()];
        client.read_exact(&mut got).await.unwrap();
        assert_eq!(got, RESP);

        drop(client);
        let report = task.await.unwrap();
        assert_eq!(report.id, 7);
        assert_eq!(report.state, ConnState::Closed);
        assert_eq!(report.hostname.as_deref(), Some("foo.test"));
        let moved = report.result.unwrap();
        assert_eq!(moved.a_to_b, REQ.len() as u64);
        assert_eq!(moved.b_to_a, RESP.len() as u64);

        let snap = stats.snapshot();
        assert_eq!(snap.relayed, 1);
        assert_eq!(snap.bytes_up, REQ.len() as u64);
        assert_eq!(snap.bytes_down, RESP.len() as u64);
    }

    #[tokio::test]
    async fn refused_dial_fails_the_connection() {
        let (h, mut client, _rx, stats) = handler(Protocol::Http, Mode::Refuse, None);
        client.write_all(b"GET / HTTP/1.1\r\nHost: down.test\r\n\r\n").await.unwrap();

        let report = h.run().await;
        assert_eq!(report.state, ConnState::FailedDial);
        assert_eq!(report.hostname.as_deref(), Some("down.test"));
        match report.result {
            Err(ConnError::DialFailure { target, source }) => {
                assert_eq!(target, "down.test:80");
                assert_eq!(source.kind(), io::ErrorKind::ConnectionRefused);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(stats.snapshot().dial_failed, 1);

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn prefix_write_failure_counts_as_dial_failure() {
        let (h, mut client, _rx, stats) = handler(Protocol::Http, Mode::DropPeer, None);
        client.write_all(b"GET / HTTP/1.1\r\nHost: gone.test\r\n\r\n").await.unwrap();

        let report = h.run().await;
        assert_eq!(report.state, ConnState::FailedDial);
        assert!(matches!(report.result, Err(ConnError::WriteFailure(_))));
        assert_eq!(stats.snapshot().dial_failed, 1);
    }

    #[tokio::test]
    async fn missing_host_fails_the_sniff() {
        let (h, mut client, mut rx, stats) = handler(Protocol::Http, Mode::Connect, None);
        client.write_all(b"GET / HTTP/1.0\r\nAccept: */*\r\n\r\n").await.unwrap();

        let report = h.run().await;
        assert_eq!(report.state, ConnState::FailedSniff);
        assert_eq!(report.hostname, None);
        assert!(matches!(report.result, Err(ConnError::Sniff(SniffError::NoHostHeader))));
        assert_eq!(stats.snapshot().sniff_failed, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn plaintext_is_not_a_handshake() {
        let (h, mut client, _rx, _) = handler(Protocol::Https, Mode::Connect, None);
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();

        let report = h.run().await;
        assert_eq!(report.state, ConnState::FailedSniff);
        assert!(matches!(report.result, Err(ConnError::Sniff(SniffError::NotHandshake(b'G')))));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_times_out() {
        let (h, _client, _rx, stats) = handler(Protocol::Https, Mode::Connect, Some(Duration::from_secs(5)));

        let report = h.run().await;
        assert_eq!(report.state, ConnState::FailedSniff);
        match report.result {
            Err(ConnError::Sniff(SniffError::ReadFailure(e))) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(stats.snapshot().sniff_failed, 1);
    }
}
