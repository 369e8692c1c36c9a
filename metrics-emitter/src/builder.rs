use std::{fmt, io, time::Duration};

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    client::Client,
    compose::{ComposeName, SourceThenName},
    line::normalize_prefix,
    transport::{build_transport, NopTransport, Transport, TransportConfig},
};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8125;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Errors that could occur while building a client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to resolve the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the resolution failure.
        reason: String,
    },

    /// Failed to create or connect the underlying socket.
    #[error("failed to create {mode} transport: {source}")]
    Io {
        /// The connection mode of the transport being created.
        mode: ConnectionMode,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// How metrics are delivered to the remote server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fire-and-forget delivery over UDP.
    ///
    /// Lines are sent one per datagram, without acknowledgement or retry.
    Datagram,

    /// Delivery over a persistent TCP connection.
    ///
    /// Lines are written newline-terminated, and broken connections are re-established according to the configured
    /// [`RetryPolicy`].
    Stream,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Datagram => f.write_str("datagram"),
            ConnectionMode::Stream => f.write_str("stream"),
        }
    }
}

/// What to do when the requested transport cannot be created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log the failure and fall back to a transport which discards every metric.
    ///
    /// Building a client never fails under this policy.
    #[default]
    Fallback,

    /// Return the failure to the caller.
    Strict,
}

/// Reconnect behavior for stream transports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Whether to reconnect and resend when a write fails because the connection broke.
    pub retry_on_disconnect: bool,

    /// Maximum number of reconnect attempts made for a single line before it is dropped.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { retry_on_disconnect: true, max_attempts: DEFAULT_MAX_RETRY_ATTEMPTS }
    }
}

/// Builder for a metrics [`Client`].
pub struct ClientBuilder {
    host: String,
    port: u16,
    mode: ConnectionMode,
    prefix: String,
    composer: Option<Box<dyn ComposeName>>,
    error_policy: ErrorPolicy,
    retry: RetryPolicy,
    connect_timeout: Duration,
    write_timeout: Duration,
    transport: Option<Box<dyn Transport>>,
}

impl ClientBuilder {
    /// Set the host of the remote server.
    ///
    /// When the host is empty, no transport is created at all and the client discards every metric.
    ///
    /// Defaults to `127.0.0.1`.
    #[must_use]
    pub fn with_host<H>(mut self, host: H) -> Self
    where
        H: Into<String>,
    {
        self.host = host.into();
        self
    }

    /// Set the port of the remote server.
    ///
    /// Defaults to 8125.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connection mode used to deliver metrics.
    ///
    /// Defaults to [`ConnectionMode::Datagram`].
    #[must_use]
    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the prefix applied to every metric name.
    ///
    /// Names are prefixed in the form of `<prefix>.<name>`. A single trailing `.` on the given prefix is removed, so
    /// `app` and `app.` are equivalent. Raw metrics are never prefixed.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn with_prefix<P>(mut self, prefix: P) -> Self
    where
        P: AsRef<str>,
    {
        self.prefix = normalize_prefix(prefix.as_ref());
        self
    }

    /// Set the strategy used to fold a metric's source into its name.
    ///
    /// Defaults to [`SourceThenName`], which produces `<source>|<name>`.
    #[must_use]
    pub fn with_name_composer<C>(mut self, composer: C) -> Self
    where
        C: ComposeName + 'static,
    {
        self.composer = Some(Box::new(composer));
        self
    }

    /// Set what happens when the requested transport cannot be created.
    ///
    /// Defaults to [`ErrorPolicy::Fallback`].
    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Set the reconnect behavior for stream transports.
    ///
    /// Has no effect in datagram mode.
    ///
    /// Defaults to retrying on disconnect, with up to 3 reconnect attempts per line.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the timeout for establishing a connection in stream mode.
    ///
    /// A zero duration disables the timeout.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the timeout for writing a line in stream mode.
    ///
    /// When the write timeout is reached, the connection is treated as broken.
    ///
    /// A zero duration disables the timeout.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Use the given transport instead of creating one.
    ///
    /// The host, port, connection mode, retry policy, and timeouts are ignored when a transport is supplied.
    #[must_use]
    pub fn with_transport<T>(mut self, transport: T) -> Self
    where
        T: Transport + 'static,
    {
        self.transport = Some(Box::new(transport));
        self
    }

    fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            host: self.host.clone(),
            port: self.port,
            mode: self.mode,
            retry: self.retry,
            connect_timeout: self.connect_timeout,
            write_timeout: self.write_timeout,
        }
    }

    fn resolve_transport(&mut self) -> Result<Box<dyn Transport>, BuildError> {
        if let Some(transport) = self.transport.take() {
            return Ok(transport);
        }

        if self.host.trim().is_empty() {
            warn!("No host configured for metrics. Metrics will be discarded.");
            return Ok(Box::new(NopTransport));
        }

        match build_transport(&self.transport_config()) {
            Ok(transport) => Ok(transport),
            Err(e) => match self.error_policy {
                ErrorPolicy::Strict => Err(e),
                ErrorPolicy::Fallback => {
                    error!(
                        error = %e,
                        host = %self.host,
                        port = self.port,
                        "Failed to create metrics transport. Metrics will be discarded."
                    );
                    Ok(Box::new(NopTransport))
                }
            },
        }
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// If the transport cannot be created and the error policy is [`ErrorPolicy::Strict`], an error is returned.
    /// Under [`ErrorPolicy::Fallback`], this never fails.
    pub fn build(mut self) -> Result<Client, BuildError> {
        let transport = self.resolve_transport()?;
        debug!(transport = transport.transport_id(), prefix = %self.prefix, "Built metrics client.");

        let composer = self.composer.unwrap_or_else(|| Box::new(SourceThenName));
        Ok(Client::new(self.prefix, composer, transport))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        ClientBuilder {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            mode: ConnectionMode::Datagram,
            prefix: String::new(),
            composer: None,
            error_policy: ErrorPolicy::default(),
            retry: RetryPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            transport: None,
        }
    }
}
