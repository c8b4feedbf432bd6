//! Shared fixtures for integration tests.

#![allow(dead_code)]

use slacksink::config::{ChannelConfig, DispatcherConfig};
use slacksink::notification::test_utils::RecordingTransport;
use slacksink::SlackChannel;
use std::sync::Arc;

/// Parses the drop count out of a summary attachment's text.
pub fn summary_drop_count(text: &str) -> Option<u64> {
    let rest = text.strip_prefix("<!channel> Too many errors! ")?;
    rest.split_whitespace().next()?.parse().ok()
}

pub fn test_identity() -> ChannelConfig {
    ChannelConfig {
        webhook_url: "http://unused".to_string(),
        username: "IntegrationTest".to_string(),
        channel: "#integration".to_string(),
        ..Default::default()
    }
}

/// Builds a channel backed by `transport` with fast time units.
pub fn test_channel(
    transport: &RecordingTransport,
    configure: impl FnOnce(&mut DispatcherConfig),
) -> SlackChannel {
    let mut config = DispatcherConfig {
        time_unit_ms: 10,
        ..Default::default()
    };
    configure(&mut config);
    SlackChannel::with_transport(test_identity(), config, Arc::new(transport.clone()))
}
