use std::time::Duration;

use metrics_emitter::{ClientBuilder, ConnectionMode, ErrorPolicy, RetryPolicy};

fn main() {
    tracing_subscriber::fmt::init();

    let client = ClientBuilder::default()
        .with_host("localhost")
        .with_port(8125)
        .with_connection_mode(ConnectionMode::Stream)
        .with_retry_policy(RetryPolicy { retry_on_disconnect: true, max_attempts: 5 })
        .with_write_timeout(Duration::from_millis(500))
        .with_error_policy(ErrorPolicy::Strict)
        .build()
        .expect("failed to connect to metrics server");

    loop {
        client.count("heartbeats", 1, Some("tcp-example")).expect("name is not empty");
        std::thread::sleep(Duration::from_secs(1));
    }
}
