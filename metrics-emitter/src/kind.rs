use std::fmt;

/// The kind of a metric, which determines its type tag on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// A counter increment.
    Count,

    /// A duration, in milliseconds.
    Timing,

    /// A point-in-time value.
    Gauge,

    /// One occurrence of a value, counted into a distinct-value set by the server.
    Set,

    /// One occurrence of a value, counted into a distinct-value set scoped to a recurring calendar window.
    Calendargram,

    /// A raw data point, optionally carrying its own timestamp.
    Raw,
}

impl MetricKind {
    /// Returns the type tag used for this kind in the wire format.
    pub const fn type_tag(self) -> &'static str {
        match self {
            MetricKind::Count => "c",
            MetricKind::Timing => "ms",
            MetricKind::Gauge => "g",
            MetricKind::Set => "s",
            MetricKind::Calendargram => "cg",
            MetricKind::Raw => "raw",
        }
    }

    /// Returns `true` if metrics of this kind are sent without the client's configured prefix.
    pub const fn ignores_prefix(self) -> bool {
        matches!(self, MetricKind::Raw)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// Calendar window codes understood by calendargram-aware servers.
///
/// The client passes periods through verbatim and does not check them against this list, so servers are free to
/// define additional codes.
pub mod period {
    /// The current hour.
    pub const HOUR: &str = "h";

    /// The current day.
    pub const DAY: &str = "d";

    /// The current day of the week.
    pub const DAY_OF_WEEK: &str = "dow";

    /// The current week.
    pub const WEEK: &str = "w";

    /// The current month.
    pub const MONTH: &str = "m";
}
