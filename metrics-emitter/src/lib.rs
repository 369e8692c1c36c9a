//! A client for emitting metrics to a statsd-style aggregation server.
//!
//! Each metric is formatted as a single line of text and handed to a transport, which delivers it to the remote
//! server:
//!
//! ```text
//! [<prefix>.]<name>[|<source>]:<value>|<type>[|<postfix>]
//! ```
//!
//! # Usage
//!
//! ```no_run
//! # use metrics_emitter::{ClientBuilder, period};
//! // First, create a builder.
//! //
//! // The builder configures where metrics are sent, how they are delivered, and how metric names are built.
//! let client = ClientBuilder::default()
//!     .with_host("metrics.example.com")
//!     .with_port(8125)
//!     .with_prefix("app")
//!     .build()
//!     .expect("fallback policy never fails");
//!
//! // Sends `app.web1|hits:5|c`.
//! client.count("hits", 5, Some("web1")).expect("name is not empty");
//!
//! // Sends `app.load:230|ms`.
//! client.timing("load", 230, None).expect("name is not empty");
//!
//! // Sends `app.logins:alice|cg|d`.
//! client.calendargram("logins", "alice", period::DAY, None).expect("name is not empty");
//!
//! // Raw metrics are never prefixed: sends `deploys:1|raw|1700000000`.
//! client.raw("deploys", 1, Some(1_700_000_000), None).expect("name is not empty");
//! ```
//!
//! # Metric kinds
//!
//! | Method | Type tag |
//! |---|---|
//! | [`count`][Client::count], [`incr`][Client::incr] | `c` |
//! | [`timing`][Client::timing], [`timing_long`][Client::timing_long], [`timing_duration`][Client::timing_duration] | `ms` |
//! | [`gauge`][Client::gauge] | `g` |
//! | [`set`][Client::set] | `s` |
//! | [`calendargram`][Client::calendargram], [`calendargram_int`][Client::calendargram_int] | `cg` |
//! | [`raw`][Client::raw] | `raw` |
//!
//! None of the kinds are defined for negative values. A negative value is dropped, with a warning, rather than sent.
//! An empty metric name is the only thing that causes an emitting method to return an error.
//!
//! # Transports
//!
//! Metrics can be delivered over UDP, where each line is sent as its own datagram on a fire-and-forget basis, or over
//! a persistent TCP connection. The TCP transport reconnects and resends when its connection breaks, up to a
//! configurable number of attempts per line, after which the line is dropped.
//!
//! Delivery failures are never reported to the caller. Emitting metrics cannot fail because the network is down.
//!
//! If the requested transport cannot be created, such as when the host cannot be resolved, the client falls back to
//! discarding every metric, unless configured with [`ErrorPolicy::Strict`]. A client built with an empty host always
//! discards every metric.
//!
//! Custom transports can be supplied by implementing [`Transport`].
//!
//! # Telemetry
//!
//! The UDP and TCP transports report on their own behavior through the [`metrics`] facade, using whichever recorder
//! is installed when the transport is created. Every counter is labeled with `client_transport`, set to the transport
//! ID (`udp` or `tcp`):
//!
//! - `metrics_emitter.client.lines_sent`: lines handed off to the operating system
//! - `metrics_emitter.client.bytes_sent`: bytes handed off to the operating system, including line terminators
//! - `metrics_emitter.client.lines_dropped`: lines that were dropped without being sent
//! - `metrics_emitter.client.reconnect_attempts`: attempts to re-establish a broken connection
//!
//! With no recorder installed, these counters do nothing.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, ClientBuilder, ConnectionMode, ErrorPolicy, RetryPolicy};

mod client;
pub use self::client::{Client, MetricError};

mod compose;
pub use self::compose::{ComposeName, SourceThenName};

mod kind;
pub use self::kind::{period, MetricKind};

mod line;

mod telemetry;

pub mod transport;
pub use self::transport::Transport;
