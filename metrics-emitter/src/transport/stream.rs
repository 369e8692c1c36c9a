use std::{
    io::{self, Write},
    net::{SocketAddr, TcpStream},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::Transport;
use crate::{builder::RetryPolicy, telemetry::TransportTelemetry};

/// A connection produced by a [`Connector`].
pub trait Connection: Write + Send {
    /// Returns `true` if the remote server is known to have closed the connection.
    ///
    /// Writing to a connection the remote server has already closed can still succeed locally, with the data then
    /// lost, so this is checked before every write.
    fn peer_closed(&self) -> bool;
}

impl Connection for TcpStream {
    fn peer_closed(&self) -> bool {
        if self.set_nonblocking(true).is_err() {
            return false;
        }

        // An orderly shutdown by the peer reads as end-of-stream. Nothing is ever expected from the server, so any
        // data waiting to be read is left alone.
        let mut buf = [0; 1];
        let closed = match self.peek(&mut buf) {
            Ok(n) => n == 0,
            Err(e) => !matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted),
        };

        // A socket stuck in non-blocking mode would fail writes unpredictably, so treat it as closed instead.
        closed || self.set_nonblocking(false).is_err()
    }
}

/// Establishes connections for a [`StreamTransport`].
pub trait Connector: Send + Sync {
    /// The connection type produced by this connector.
    type Stream: Connection;

    /// Opens a new connection to the remote server.
    ///
    /// # Errors
    ///
    /// If the connection cannot be established, an error is returned.
    fn connect(&self) -> io::Result<Self::Stream>;

    /// Returns the transport ID of connections produced by this connector.
    fn transport_id(&self) -> &'static str;
}

/// Connects to a remote server over TCP.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    addrs: Vec<SocketAddr>,
    connect_timeout: Duration,
    write_timeout: Duration,
}

impl TcpConnector {
    /// Creates a `TcpConnector` that tries each of the given addresses in order.
    ///
    /// A zero timeout disables the corresponding timeout.
    pub fn new(addrs: Vec<SocketAddr>, connect_timeout: Duration, write_timeout: Duration) -> Self {
        TcpConnector { addrs, connect_timeout, write_timeout }
    }

    fn connect_addr(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        let stream = if self.connect_timeout.is_zero() {
            TcpStream::connect(addr)?
        } else {
            TcpStream::connect_timeout(addr, self.connect_timeout)?
        };

        stream.set_write_timeout(Some(self.write_timeout).filter(|t| !t.is_zero()))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self) -> io::Result<TcpStream> {
        let mut last_error = None;
        for addr in &self.addrs {
            match self.connect_addr(addr) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    trace!(%addr, error = %e, "Failed to connect to address.");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no addresses to connect to")))
    }

    fn transport_id(&self) -> &'static str {
        "tcp"
    }
}

enum ConnectionState<S> {
    // Transport is currently disconnected.
    Disconnected,

    // Transport is connected and ready to send metrics.
    Ready(S),
}

/// A connection-oriented transport that reconnects when its connection breaks.
///
/// Lines are written newline-terminated over a single persistent connection. Sends are serialized, so a
/// `StreamTransport` can be shared freely between threads.
///
/// When a write fails, the connection is discarded. If the [`RetryPolicy`] allows it, the transport then tries to
/// reconnect and resend the line, up to the configured number of attempts, before dropping the line. When retrying is
/// disabled, the line is dropped immediately. A send that starts out disconnected always makes at least one attempt
/// to reconnect.
///
/// Before each write, the connection is checked for an orderly close by the remote server, which is handled the same
/// way as a failed write. This cannot catch every failure: if the server goes away without closing the connection,
/// or closes it between the check and the write, the operating system may still accept the write. That line is
/// counted as sent but is lost, and the broken connection is only noticed on a later send.
pub struct StreamTransport<C: Connector> {
    connector: C,
    retry: RetryPolicy,
    state: Mutex<ConnectionState<C::Stream>>,
    telemetry: TransportTelemetry,
}

/// A [`StreamTransport`] over TCP.
pub type TcpTransport = StreamTransport<TcpConnector>;

impl<C: Connector> StreamTransport<C> {
    /// Creates a `StreamTransport`, establishing the initial connection immediately.
    ///
    /// # Errors
    ///
    /// If the initial connection cannot be established, an error is returned.
    pub fn connect(connector: C, retry: RetryPolicy) -> io::Result<Self> {
        let stream = connector.connect()?;
        debug!(transport = connector.transport_id(), "Connected stream transport.");

        Ok(StreamTransport {
            retry,
            state: Mutex::new(ConnectionState::Ready(stream)),
            telemetry: TransportTelemetry::new(connector.transport_id()),
            connector,
        })
    }

    fn reconnect_budget(&self, connected: bool) -> u32 {
        let retries = if self.retry.retry_on_disconnect { self.retry.max_attempts } else { 0 };
        if connected {
            retries
        } else {
            // A transport that is already disconnected always gets at least one attempt, so it can recover.
            retries.max(1)
        }
    }
}

fn write_line<W: Write>(stream: &mut W, payload: &[u8]) -> io::Result<()> {
    stream.write_all(payload)?;
    stream.flush()
}

impl<C: Connector> Transport for StreamTransport<C> {
    fn send(&self, line: &str) {
        let mut payload = Vec::with_capacity(line.len() + 1);
        payload.extend_from_slice(line.as_bytes());
        payload.push(b'\n');

        let mut state = self.state.lock();
        let mut remaining = self.reconnect_budget(matches!(*state, ConnectionState::Ready(_)));
        let mut attempts = 0;

        loop {
            match std::mem::replace(&mut *state, ConnectionState::Disconnected) {
                ConnectionState::Ready(stream) if stream.peer_closed() => {
                    debug!("Remote server closed the connection, discarding connection.");
                }
                ConnectionState::Ready(mut stream) => match write_line(&mut stream, &payload) {
                    Ok(()) => {
                        *state = ConnectionState::Ready(stream);
                        self.telemetry.track_line_sent(payload.len());
                        trace!(len = payload.len(), "Sent metric line.");
                        return;
                    }
                    Err(e) => {
                        debug!(error = %e, "Failed to write metric line, discarding connection.");
                    }
                },
                ConnectionState::Disconnected => {
                    if remaining == 0 {
                        self.telemetry.track_line_dropped();
                        error!(
                            transport = self.connector.transport_id(),
                            reconnect_attempts = attempts,
                            "Failed to send metric line, dropping."
                        );
                        return;
                    }

                    remaining -= 1;
                    attempts += 1;
                    self.telemetry.track_reconnect_attempt();

                    match self.connector.connect() {
                        Ok(stream) => {
                            debug!(attempt = attempts, "Reconnected stream transport.");
                            *state = ConnectionState::Ready(stream);
                        }
                        Err(e) => warn!(attempt = attempts, error = %e, "Failed to reconnect."),
                    }
                }
            }
        }
    }

    fn transport_id(&self) -> &'static str {
        self.connector.transport_id()
    }
}
