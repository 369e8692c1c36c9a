//! Transports for delivering metric lines to a remote server.
//!
//! A [`Transport`] receives fully formatted lines and owns every aspect of getting them to the remote server. The
//! provided transports are [`UdpTransport`], [`TcpTransport`] (a [`StreamTransport`] over TCP), and
//! [`NopTransport`].

use std::{
    net::{SocketAddr, ToSocketAddrs as _},
    sync::Arc,
    time::Duration,
};

use crate::builder::{BuildError, ConnectionMode, RetryPolicy};

mod nop;
pub use self::nop::NopTransport;

mod stream;
pub use self::stream::{Connection, Connector, StreamTransport, TcpConnector, TcpTransport};

mod udp;
pub use self::udp::UdpTransport;

/// Delivers formatted metric lines to a remote server.
///
/// Transports own every aspect of delivery: sending, retrying, and dropping lines. `send` has no return value, and
/// implementations must never panic on delivery failures; failures are logged and the line is dropped. This keeps
/// metrics emission from ever affecting the control flow of the application emitting them.
///
/// Implementations must be safe to call from many threads at once.
pub trait Transport: Send + Sync {
    /// Sends a single metric line.
    ///
    /// The line does not carry a trailing newline. Transports which need lines to be delimited are responsible for
    /// adding one.
    fn send(&self, line: &str);

    /// Returns the transport ID.
    ///
    /// This is a simple acronym related to the transport, such as `udp` for UDP, and so on.
    fn transport_id(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, line: &str) {
        (**self).send(line);
    }

    fn transport_id(&self) -> &'static str {
        (**self).transport_id()
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, line: &str) {
        (**self).send(line);
    }

    fn transport_id(&self) -> &'static str {
        (**self).transport_id()
    }
}

/// Transport configuration.
#[derive(Clone, Debug)]
pub(crate) struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub mode: ConnectionMode,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

impl TransportConfig {
    /// Resolves the configured host and port to the set of remote addresses to try.
    pub fn resolve(&self) -> Result<Vec<SocketAddr>, BuildError> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| BuildError::InvalidRemoteAddress { reason: e.to_string() })?
            .collect::<Vec<_>>();

        if addrs.is_empty() {
            return Err(BuildError::InvalidRemoteAddress {
                reason: format!("'{}:{}' did not resolve to any addresses", self.host, self.port),
            });
        }

        Ok(addrs)
    }
}

/// Builds the transport described by the given configuration.
///
/// # Errors
///
/// If the remote address cannot be resolved, or the underlying socket cannot be created or connected, an error is
/// returned.
pub(crate) fn build_transport(config: &TransportConfig) -> Result<Box<dyn Transport>, BuildError> {
    let addrs = config.resolve()?;

    match config.mode {
        ConnectionMode::Datagram => {
            let transport = UdpTransport::connect(&addrs)
                .map_err(|source| BuildError::Io { mode: config.mode, source })?;
            Ok(Box::new(transport))
        }
        ConnectionMode::Stream => {
            let connector = TcpConnector::new(addrs, config.connect_timeout, config.write_timeout);
            let transport = StreamTransport::connect(connector, config.retry)
                .map_err(|source| BuildError::Io { mode: config.mode, source })?;
            Ok(Box::new(transport))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{net::TcpListener, time::Duration};

    use super::{build_transport, TransportConfig};
    use crate::builder::{BuildError, ConnectionMode, RetryPolicy};

    fn config(host: &str, port: u16, mode: ConnectionMode) -> TransportConfig {
        TransportConfig {
            host: host.to_string(),
            port,
            mode,
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_millis(250),
            write_timeout: Duration::from_millis(250),
        }
    }

    #[test]
    fn datagram_transport_for_loopback() {
        let transport = build_transport(&config("127.0.0.1", 8125, ConnectionMode::Datagram))
            .expect("udp transport should build");
        assert_eq!(transport.transport_id(), "udp");
    }

    #[test]
    fn stream_transport_for_listening_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind listener");
        let port = listener.local_addr().expect("no local address").port();

        let transport = build_transport(&config("127.0.0.1", port, ConnectionMode::Stream))
            .expect("tcp transport should build");
        assert_eq!(transport.transport_id(), "tcp");
    }

    #[test]
    fn stream_transport_fails_without_peer() {
        // Bind and immediately release a port so that nothing is listening on it.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind listener");
            listener.local_addr().expect("no local address").port()
        };

        let result = build_transport(&config("127.0.0.1", port, ConnectionMode::Stream));
        assert!(matches!(result, Err(BuildError::Io { mode: ConnectionMode::Stream, .. })));
    }

    #[test]
    fn unresolvable_host() {
        let result = build_transport(&config("metrics.invalid", 8125, ConnectionMode::Datagram));
        assert!(matches!(result, Err(BuildError::InvalidRemoteAddress { .. })));
    }
}
