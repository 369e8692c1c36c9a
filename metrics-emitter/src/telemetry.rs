use std::fmt;

use metrics::{counter, Counter};

pub(crate) const LINES_SENT: &str = "metrics_emitter.client.lines_sent";
pub(crate) const LINES_DROPPED: &str = "metrics_emitter.client.lines_dropped";
pub(crate) const BYTES_SENT: &str = "metrics_emitter.client.bytes_sent";
pub(crate) const RECONNECT_ATTEMPTS: &str = "metrics_emitter.client.reconnect_attempts";

/// Transport telemetry.
///
/// `TransportTelemetry` tracks what a transport did with the lines handed to it: how many were delivered to the
/// operating system, how many were dropped, and how often a connection had to be re-established. Counters are
/// registered with the `metrics` recorder that is installed when the transport is created, labeled with the
/// transport ID, and are no-ops when no recorder is installed.
pub(crate) struct TransportTelemetry {
    lines_sent: Counter,
    lines_dropped: Counter,
    bytes_sent: Counter,
    reconnect_attempts: Counter,
}

impl TransportTelemetry {
    pub(crate) fn new(transport: &'static str) -> Self {
        TransportTelemetry {
            lines_sent: counter!(LINES_SENT, "client_transport" => transport),
            lines_dropped: counter!(LINES_DROPPED, "client_transport" => transport),
            bytes_sent: counter!(BYTES_SENT, "client_transport" => transport),
            reconnect_attempts: counter!(RECONNECT_ATTEMPTS, "client_transport" => transport),
        }
    }

    pub(crate) fn track_line_sent(&self, len: usize) {
        self.lines_sent.increment(1);
        self.bytes_sent.increment(len as u64);
    }

    pub(crate) fn track_line_dropped(&self) {
        self.lines_dropped.increment(1);
    }

    pub(crate) fn track_reconnect_attempt(&self) {
        self.reconnect_attempts.increment(1);
    }
}

impl fmt::Debug for TransportTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportTelemetry").finish_non_exhaustive()
    }
}

/// Reads the current value of the counter `name`, or zero if it was never registered.
#[cfg(test)]
pub(crate) fn counter_value(snapshotter: &metrics_util::debugging::Snapshotter, name: &str) -> u64 {
    use metrics_util::debugging::DebugValue;

    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(key, _, _, value)| match value {
            DebugValue::Counter(value) if key.key().name() == name => Some(value),
            _ => None,
        })
        .unwrap_or(0)
}
