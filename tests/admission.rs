//! Integration tests for the caller-facing admission paths.

mod helpers;

use helpers::test_channel;
use slacksink::notification::test_utils::{FakeOutcome, RecordingTransport};
use slacksink::{Colour, NotifyError};
use std::time::Duration;

#[tokio::test]
async fn test_uncontended_send_message_resolves_once() {
    let transport = RecordingTransport::new();
    let channel = test_channel(&transport, |_| {});

    let result = channel
        .send_message("deploy finished", Colour::good(), &[("Version", "1.2.3")], &[])
        .await;

    assert!(result.is_ok());
    let sent = transport.sent_messages();
    assert_eq!(sent.len(), 1, "the message should be sent exactly once");
    assert_eq!(sent[0].channel, "#integration");
    assert_eq!(sent[0].attachments[0].text, "deploy finished");
}

#[tokio::test]
async fn test_stalled_dispatcher_times_out_admission() {
    let transport = RecordingTransport::gated();
    // 20ms units give a 100ms admission timeout.
    let channel = test_channel(&transport, |c| c.time_unit_ms = 20);

    // The first message is taken by the worker, which then stalls in the transport.
    let first = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.send_message("first", Colour::good(), &[], &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The second one fills the single inbox slot.
    let second = {
        let channel = channel.clone();
        tokio::spawn(async move { channel.send_message("second", Colour::good(), &[], &[]).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let third = channel.send_message("third", Colour::good(), &[], &[]).await;
    assert!(matches!(third, Err(NotifyError::AdmissionTimeout)));

    transport.release(2);
    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let texts: Vec<_> = transport
        .sent_messages()
        .iter()
        .map(|m| m.attachments[0].text.clone())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn test_transport_failure_reaches_message_caller() {
    let transport = RecordingTransport::new();
    transport.push_outcome(FakeOutcome::Status(404));
    let channel = test_channel(&transport, |_| {});

    let result = channel.send_message("hello", Colour::good(), &[], &[]).await;

    assert!(matches!(result, Err(NotifyError::Status(404))));
}

#[tokio::test]
async fn test_rate_limit_reaches_message_caller() {
    let transport = RecordingTransport::new();
    transport.push_outcome(FakeOutcome::RateLimited {
        second: 6,
        minute: 120,
    });
    let channel = test_channel(&transport, |_| {});

    let result = channel.send_message("hello", Colour::good(), &[], &[]).await;

    let counters = result.unwrap_err().rate_limit().copied().unwrap();
    assert_eq!(counters.second, 6);
    assert_eq!(counters.minute, 120);
}
