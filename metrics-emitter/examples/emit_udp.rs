use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use metrics_emitter::{period, ClientBuilder};

fn main() {
    tracing_subscriber::fmt::init();

    let client = ClientBuilder::default()
        .with_host("localhost")
        .with_port(8125)
        .with_prefix("example")
        .build()
        .expect("fallback policy never fails");

    let started = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    client.raw("starts", 1, Some(started), None).expect("name is not empty");

    // Loop over and over, pretending to do some work.
    for iteration in 0_i64.. {
        let start = Instant::now();
        std::thread::sleep(Duration::from_millis(25));

        client.incr("loops", Some("worker1")).expect("name is not empty");
        client.timing_duration("loop_time", start.elapsed(), None).expect("name is not empty");
        client.gauge("iteration", iteration, None).expect("name is not empty");
        client.set("workers", 1, None).expect("name is not empty");
        client.calendargram_int("active_workers", 1, period::HOUR, None).expect("name is not empty");
    }
}
