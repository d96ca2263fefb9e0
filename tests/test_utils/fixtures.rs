//! Fixtures shared by the integration tests.

use std::{net::TcpListener, time::Duration};

use fluent_sender::{FluentSender, SenderBuilder};
use rstest::fixture;

use super::collector::MockCollector;

pub const WAIT: Duration = Duration::from_secs(5);

/// A running collector on an ephemeral port.
#[fixture]
pub fn collector() -> MockCollector {
    MockCollector::start()
}

/// A loopback port with no listener; connects are refused.
#[fixture]
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
    listener.local_addr().expect("listener address").port()
}

/// Builder for a `test`-prefixed sender aimed at `port` with short timeouts.
pub fn builder_for(port: u16) -> SenderBuilder {
    SenderBuilder::new("test")
        .with_tcp("127.0.0.1", port)
        .with_timeout(Duration::from_millis(500))
        .with_close_timeout_ms(2_000)
}

pub fn sender_for(port: u16) -> FluentSender {
    builder_for(port).build().expect("build sender")
}
