use std::{
    io,
    net::{Ipv4Addr, SocketAddr, UdpSocket},
};

use tracing::{debug, trace};

use super::Transport;
use crate::telemetry::TransportTelemetry;

/// A fire-and-forget datagram transport.
///
/// Each line is sent as its own datagram over a non-blocking socket. There is no acknowledgement and no retry: if a
/// datagram cannot be sent, the line is dropped.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    telemetry: TransportTelemetry,
}

impl UdpTransport {
    /// Creates a `UdpTransport` sending to the first of the given addresses that the socket can be connected to.
    ///
    /// # Errors
    ///
    /// If the local socket cannot be bound or configured, or cannot be connected to any of the given addresses, an
    /// error is returned.
    pub fn connect(addrs: &[SocketAddr]) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(addrs)?;
        socket.set_nonblocking(true)?;

        debug!(remote_addr = ?socket.peer_addr().ok(), "Created UDP transport.");

        Ok(UdpTransport { socket, telemetry: TransportTelemetry::new("udp") })
    }
}

impl Transport for UdpTransport {
    fn send(&self, line: &str) {
        match self.socket.send(line.as_bytes()) {
            Ok(len) => {
                self.telemetry.track_line_sent(len);
                trace!(len, "Sent metric line.");
            }
            Err(e) => {
                self.telemetry.track_line_dropped();
                // Still just best effort, so there's no need to be loud about every failure.
                debug!(error = %e, "Failed to send metric line, dropping.");
            }
        }
    }

    fn transport_id(&self) -> &'static str {
        "udp"
    }
}
