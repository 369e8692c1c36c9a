use std::{borrow::Cow, fmt, time::Duration};

use thiserror::Error;
use tracing::warn;

use crate::{
    compose::ComposeName,
    kind::MetricKind,
    line::{build_line, MetricValue, ValueFormatter},
    transport::Transport,
};

/// Errors that could occur while emitting a metric.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum MetricError {
    /// The metric name was empty.
    #[error("metric name must not be empty")]
    InvalidName,
}

/// A metrics client.
///
/// `Client` formats each metric into a single line and hands it to its transport. It holds no per-call state, and can
/// be shared between any number of threads.
///
/// Every emitting method either sends exactly one line, or sends nothing:
///
/// - an empty name is rejected with [`MetricError::InvalidName`]
/// - a negative value is dropped with a warning, and `Ok(())` is returned
///
/// Whether a sent line actually reaches the remote server is up to the transport, and is never reported back.
///
/// Clients are created with [`ClientBuilder`][crate::ClientBuilder].
pub struct Client {
    prefix: String,
    composer: Box<dyn ComposeName>,
    transport: Box<dyn Transport>,
}

impl Client {
    pub(crate) fn new(prefix: String, composer: Box<dyn ComposeName>, transport: Box<dyn Transport>) -> Self {
        Client { prefix, composer, transport }
    }

    /// Returns the prefix applied to metric names.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the ID of the transport in use, such as `udp`, `tcp`, or `nop`.
    pub fn transport_id(&self) -> &'static str {
        self.transport.transport_id()
    }

    /// Increments a counter by the given amount.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn count(&self, name: &str, count: i64, source: Option<&str>) -> Result<(), MetricError> {
        self.send_numeric(MetricKind::Count, name, count, source, None)
    }

    /// Increments a counter by one.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn incr(&self, name: &str, source: Option<&str>) -> Result<(), MetricError> {
        self.count(name, 1, source)
    }

    /// Records a duration, in milliseconds.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn timing(&self, name: &str, millis: i32, source: Option<&str>) -> Result<(), MetricError> {
        self.send_numeric(MetricKind::Timing, name, i64::from(millis), source, None)
    }

    /// Records a duration, in milliseconds, from a 64-bit value.
    ///
    /// Values outside of the range of [`timing`][Client::timing] are saturated to that range.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn timing_long(&self, name: &str, millis: i64, source: Option<&str>) -> Result<(), MetricError> {
        let millis = i32::try_from(millis).unwrap_or(if millis < 0 { i32::MIN } else { i32::MAX });
        self.timing(name, millis, source)
    }

    /// Records a duration as whole milliseconds.
    ///
    /// Durations too long to be represented are saturated.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn timing_duration(&self, name: &str, duration: Duration, source: Option<&str>) -> Result<(), MetricError> {
        let millis = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        self.timing(name, millis, source)
    }

    /// Sets a gauge to the given value.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn gauge(&self, name: &str, value: i64, source: Option<&str>) -> Result<(), MetricError> {
        self.send_numeric(MetricKind::Gauge, name, value, source, None)
    }

    /// Records one occurrence of a value, to be counted into a set of distinct values.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn set(&self, name: &str, value: i64, source: Option<&str>) -> Result<(), MetricError> {
        self.send_numeric(MetricKind::Set, name, value, source, None)
    }

    /// Records one occurrence of a value, to be counted into a set of distinct values for the current calendar
    /// window.
    ///
    /// `period` identifies the window, such as [`period::DAY`][crate::period::DAY], and is sent as-is.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn calendargram(
        &self,
        name: &str,
        value: &str,
        period: &str,
        source: Option<&str>,
    ) -> Result<(), MetricError> {
        self.send_metric(MetricKind::Calendargram, name, MetricValue::Text(value), source, Some(period))
    }

    /// Records one occurrence of a numeric value for the current calendar window.
    ///
    /// See [`calendargram`][Client::calendargram] for more details.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn calendargram_int(
        &self,
        name: &str,
        value: i64,
        period: &str,
        source: Option<&str>,
    ) -> Result<(), MetricError> {
        self.send_numeric(MetricKind::Calendargram, name, value, source, Some(period))
    }

    /// Records a raw data point, optionally stamped with a Unix timestamp in seconds.
    ///
    /// Raw metrics are never prefixed.
    ///
    /// # Errors
    ///
    /// If `name` is empty, an error is returned.
    pub fn raw(&self, name: &str, value: i64, epoch: Option<u64>, source: Option<&str>) -> Result<(), MetricError> {
        let epoch = epoch.map(|epoch| itoa::Buffer::new().format(epoch).to_string());
        self.send_numeric(MetricKind::Raw, name, value, source, epoch.as_deref())
    }

    fn send_numeric(
        &self,
        kind: MetricKind,
        name: &str,
        value: i64,
        source: Option<&str>,
        postfix: Option<&str>,
    ) -> Result<(), MetricError> {
        if name.is_empty() {
            return Err(MetricError::InvalidName);
        }

        let Some(value) = MetricValue::non_negative(value) else {
            warn!(metric = name, kind = %kind, value, "Dropping metric with negative value.");
            return Ok(());
        };

        self.send_metric(kind, name, value, source, postfix)
    }

    fn send_metric(
        &self,
        kind: MetricKind,
        name: &str,
        value: MetricValue<'_>,
        source: Option<&str>,
        postfix: Option<&str>,
    ) -> Result<(), MetricError> {
        if name.is_empty() {
            return Err(MetricError::InvalidName);
        }

        let name = match source.filter(|source| !source.is_empty()) {
            Some(source) => Cow::Owned(self.composer.compose(name, source)),
            None => Cow::Borrowed(name),
        };
        let prefix = if kind.ignores_prefix() { "" } else { self.prefix.as_str() };

        let mut formatter = ValueFormatter::new();
        let line = build_line(prefix, &name, formatter.format(value), kind, postfix);

        self.transport.send(&line);
        Ok(())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("prefix", &self.prefix)
            .field("transport", &self.transport.transport_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc, time::Duration};

    use mockall::{mock, predicate::eq};
    use parking_lot::Mutex;
    use proptest::prelude::*;

    use super::{Client, MetricError};
    use crate::{period, transport::Transport, ClientBuilder};

    mock! {
        pub LineTransport {}

        impl Transport for LineTransport {
            fn send(&self, line: &str);
            fn transport_id(&self) -> &'static str;
        }
    }

    fn mock_transport() -> MockLineTransport {
        let mut transport = MockLineTransport::new();
        transport.expect_transport_id().return_const("mock");
        transport
    }

    fn expect_line(line: &'static str) -> MockLineTransport {
        let mut transport = mock_transport();
        transport.expect_send().with(eq(line)).times(1).return_const(());
        transport
    }

    fn expect_nothing() -> MockLineTransport {
        let mut transport = mock_transport();
        transport.expect_send().never();
        transport
    }

    fn client(prefix: &str, transport: MockLineTransport) -> Client {
        ClientBuilder::default()
            .with_prefix(prefix)
            .with_transport(transport)
            .build()
            .expect("injected transport should never fail")
    }

    #[derive(Default)]
    struct RecordingTransport {
        lines: Mutex<Vec<String>>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, line: &str) {
            self.lines.lock().push(line.to_string());
        }

        fn transport_id(&self) -> &'static str {
            "recording"
        }
    }

    fn recording_client(prefix: &str) -> (Client, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let client = ClientBuilder::default()
            .with_prefix(prefix)
            .with_transport(Arc::clone(&transport))
            .build()
            .expect("injected transport should never fail");
        (client, transport)
    }

    #[test]
    fn count_with_source_and_prefix() {
        let client = client("app", expect_line("app.web1|hits:5|c"));
        assert_eq!(client.count("hits", 5, Some("web1")), Ok(()));
    }

    #[test]
    fn incr_counts_one() {
        let client = client("", expect_line("hits:1|c"));
        assert_eq!(client.incr("hits", None), Ok(()));
    }

    #[test]
    fn timing_without_prefix() {
        let client = client("", expect_line("load:230|ms"));
        assert_eq!(client.timing("load", 230, None), Ok(()));
    }

    #[test]
    fn timing_long_saturates() {
        let client = client("", expect_line("load:2147483647|ms"));
        assert_eq!(client.timing_long("load", i64::MAX, None), Ok(()));
    }

    #[test]
    fn timing_long_negative_is_dropped() {
        let client = client("", expect_nothing());
        assert_eq!(client.timing_long("load", i64::MIN, None), Ok(()));
    }

    #[test]
    fn timing_duration_in_millis() {
        let client = client("", expect_line("load:1500|ms"));
        assert_eq!(client.timing_duration("load", Duration::from_micros(1_500_900), None), Ok(()));
    }

    #[test]
    fn gauge_and_set() {
        let mut transport = mock_transport();
        transport.expect_send().with(eq("app.temp:21|g")).times(1).return_const(());
        transport.expect_send().with(eq("app.users:42|s")).times(1).return_const(());

        let client = client("app.", transport);
        assert_eq!(client.gauge("temp", 21, None), Ok(()));
        assert_eq!(client.set("users", 42, None), Ok(()));
    }

    #[test]
    fn negative_gauge_is_dropped() {
        let client = client("", expect_nothing());
        assert_eq!(client.gauge("temp", -3, None), Ok(()));
    }

    #[test]
    fn calendargram_passes_period_through() {
        let mut transport = mock_transport();
        transport.expect_send().with(eq("app.logins:alice|cg|dow")).times(1).return_const(());
        transport.expect_send().with(eq("app.logins:7|cg|quarter")).times(1).return_const(());

        let client = client("app", transport);
        assert_eq!(client.calendargram("logins", "alice", period::DAY_OF_WEEK, None), Ok(()));
        assert_eq!(client.calendargram_int("logins", 7, "quarter", None), Ok(()));
    }

    #[test]
    fn negative_calendargram_int_is_dropped() {
        let client = client("", expect_nothing());
        assert_eq!(client.calendargram_int("logins", -7, period::DAY, None), Ok(()));
    }

    #[test]
    fn raw_ignores_prefix() {
        let client = client("app", expect_line("deploys:1|raw|1700000000"));
        assert_eq!(client.raw("deploys", 1, Some(1_700_000_000), None), Ok(()));
    }

    #[test]
    fn raw_without_epoch() {
        let client = client("app", expect_line("web1|deploys:1|raw"));
        assert_eq!(client.raw("deploys", 1, None, Some("web1")), Ok(()));
    }

    #[test]
    fn empty_name_is_rejected() {
        let client = client("app", expect_nothing());
        assert_eq!(client.count("", 1, None), Err(MetricError::InvalidName));
        assert_eq!(client.gauge("", -3, Some("web1")), Err(MetricError::InvalidName));
        assert_eq!(client.timing_long("", 5, None), Err(MetricError::InvalidName));
        assert_eq!(client.calendargram("", "alice", period::HOUR, None), Err(MetricError::InvalidName));
        assert_eq!(client.raw("", 1, Some(1), None), Err(MetricError::InvalidName));
    }

    #[test]
    fn empty_source_is_ignored() {
        let client = client("", expect_line("hits:2|c"));
        assert_eq!(client.count("hits", 2, Some("")), Ok(()));
    }

    #[test]
    fn custom_name_composer() {
        let client = ClientBuilder::default()
            .with_prefix("app")
            .with_name_composer(|name: &str, source: &str| format!("{name}.by_source.{source}"))
            .with_transport(expect_line("app.hits.by_source.web1:5|c"))
            .build()
            .expect("injected transport should never fail");
        assert_eq!(client.count("hits", 5, Some("web1")), Ok(()));
    }

    #[test]
    fn nop_client_discards_everything() {
        let client = ClientBuilder::default().with_host("").build().expect("empty host should never fail");
        assert_eq!(client.transport_id(), "nop");
        assert_eq!(client.count("hits", 5, Some("web1")), Ok(()));
        assert_eq!(client.raw("deploys", 1, Some(1_700_000_000), None), Ok(()));
        assert_eq!(client.count("", 5, None), Err(MetricError::InvalidName));
    }

    #[test]
    fn negative_value_logs_one_warning() {
        #[derive(Clone, Default)]
        struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

        impl io::Write for CapturedLogs {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let client = client("", expect_nothing());
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            assert_eq!(client.gauge("temp", -3, None), Ok(()));
        });

        let output = String::from_utf8(logs.0.lock().clone()).expect("logs should be UTF-8");
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("WARN"));
        assert!(output.contains("temp"));
    }

    #[test]
    fn concurrent_dispatch() {
        let (client, transport) = recording_client("app");
        let client = Arc::new(client);

        let handles = (0..4)
            .map(|i| {
                let client = Arc::clone(&client);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        client.count("hits", i, None).expect("valid metric should be accepted");
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("dispatch thread panicked");
        }

        let lines = transport.lines.lock();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|line| line.starts_with("app.hits:") && line.ends_with("|c")));
    }

    proptest! {
        #[test]
        fn line_without_source(
            prefix in "[a-z]{0,8}",
            name in "[a-zA-Z0-9_.]{1,32}",
            value in 0..=i64::MAX,
        ) {
            let (client, transport) = recording_client(&prefix);
            prop_assert_eq!(client.gauge(&name, value, None), Ok(()));

            let expected = if prefix.is_empty() {
                format!("{name}:{value}|g")
            } else {
                format!("{prefix}.{name}:{value}|g")
            };
            prop_assert_eq!(transport.lines.lock().clone(), vec![expected]);
        }

        #[test]
        fn source_is_composed_before_name(
            name in "[a-zA-Z0-9_]{1,32}",
            source in "[a-z0-9-]{1,16}",
            value in 0..=i64::MAX,
        ) {
            let (client, transport) = recording_client("");
            prop_assert_eq!(client.count(&name, value, Some(&source)), Ok(()));
            prop_assert_eq!(transport.lines.lock().clone(), vec![format!("{source}|{name}:{value}|c")]);
        }

        #[test]
        fn negative_values_never_reach_transport(
            name in "[a-zA-Z0-9_]{1,32}",
            value in i64::MIN..0,
            source in proptest::option::of("[a-z0-9]{1,8}"),
        ) {
            let (client, transport) = recording_client("app");
            let source = source.as_deref();
            prop_assert_eq!(client.count(&name, value, source), Ok(()));
            prop_assert_eq!(client.gauge(&name, value, source), Ok(()));
            prop_assert_eq!(client.set(&name, value, source), Ok(()));
            prop_assert_eq!(client.timing_long(&name, value, source), Ok(()));
            prop_assert_eq!(client.calendargram_int(&name, value, period::WEEK, source), Ok(()));
            prop_assert_eq!(client.raw(&name, value, Some(1), source), Ok(()));
            prop_assert!(transport.lines.lock().is_empty());
        }

        #[test]
        fn empty_name_always_rejected(value in any::<i64>(), source in proptest::option::of("[a-z0-9]{0,8}")) {
            let (client, transport) = recording_client("app");
            let source = source.as_deref();
            prop_assert_eq!(client.count("", value, source), Err(MetricError::InvalidName));
            prop_assert_eq!(client.gauge("", value, source), Err(MetricError::InvalidName));
            prop_assert!(transport.lines.lock().is_empty());
        }

        #[test]
        fn raw_never_prefixed(
            prefix in "[a-z]{1,8}",
            name in "[a-zA-Z0-9_]{1,32}",
            value in 0..=i64::MAX,
            epoch in proptest::option::of(any::<u64>()),
        ) {
            let (client, transport) = recording_client(&prefix);
            prop_assert_eq!(client.raw(&name, value, epoch, None), Ok(()));

            let expected = match epoch {
                Some(epoch) => format!("{name}:{value}|raw|{epoch}"),
                None => format!("{name}:{value}|raw"),
            };
            prop_assert_eq!(transport.lines.lock().clone(), vec![expected]);
        }
    }
}
