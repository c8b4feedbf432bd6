//! The dispatcher is the single worker that owns the send path of a channel.
//!
//! Every outbound request goes through its loop, so at most one send is ever
//! in flight. Each cycle it prefers queued errors over a waiting plain
//! message, sends the chosen unit, adapts its cadence from the outcome, and
//! sleeps before the next cycle.

use crate::config::{ChannelConfig, DispatcherConfig};
use crate::core::{Attachment, Message, Transport};
use crate::notification::backoff::Backoff;
use crate::notification::queue::ErrorBatcher;
use crate::notification::NotifyError;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

/// A caller-supplied message and the signal its caller is waiting on.
#[derive(Debug)]
pub struct PlainMessage {
    pub message: Message,
    pub done: oneshot::Sender<Result<(), NotifyError>>,
}

/// One unit of work per dispatch cycle.
#[derive(Debug)]
pub enum OutgoingUnit {
    Batch(Vec<Attachment>),
    Plain(PlainMessage),
}

/// The dispatcher actor.
pub struct Dispatcher {
    identity: ChannelConfig,
    transport: Arc<dyn Transport>,
    errors: ErrorBatcher,
    inbox: mpsc::Receiver<PlainMessage>,
    backoff: Backoff,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`.
    pub fn new(
        identity: ChannelConfig,
        config: &DispatcherConfig,
        transport: Arc<dyn Transport>,
        errors: ErrorBatcher,
        inbox: mpsc::Receiver<PlainMessage>,
    ) -> Self {
        Self {
            identity,
            transport,
            errors,
            inbox,
            backoff: Backoff::new(config),
        }
    }

    /// Runs the dispatch loop until every producer handle is gone.
    #[instrument(skip_all, fields(channel = %self.identity.channel))]
    pub async fn run(mut self) {
        info!("Slack dispatcher started.");
        while let Some(unit) = self.next_unit().await {
            self.dispatch(unit).await;
            let cadence = self.backoff.cadence();
            metrics::gauge!("slack_cadence_units").set(self.backoff.cadence_units());
            tokio::time::sleep(cadence).await;
        }
        info!("All producers gone. Slack dispatcher shutting down.");
    }

    /// Picks this cycle's unit. Pending errors always win over a plain message.
    async fn next_unit(&mut self) -> Option<OutgoingUnit> {
        let pending = self.errors.drain_available(None);
        if !pending.is_empty() {
            return Some(OutgoingUnit::Batch(self.errors.assemble(pending)));
        }

        tokio::select! {
            biased;
            event = self.errors.recv() => {
                let seeded = self.errors.drain_available(Some(event?));
                Some(OutgoingUnit::Batch(self.errors.assemble(seeded)))
            }
            message = self.inbox.recv() => message.map(OutgoingUnit::Plain),
        }
    }

    async fn dispatch(&mut self, unit: OutgoingUnit) {
        match unit {
            OutgoingUnit::Batch(attachments) => {
                let count = attachments.len();
                metrics::histogram!("slack_batch_size").record(count as f64);
                debug!(count, "Sending error batch");
                let result = self.send(Message::from_attachments(attachments)).await;
                if let Err(e) = &result {
                    // Batches have no caller to report to.
                    warn!(error = %e, count, "Failed to send error batch");
                }
                self.backoff.observe(&result);
            }
            OutgoingUnit::Plain(PlainMessage { message, done }) => {
                let result = self.send(message).await;
                self.backoff.observe(&result);
                if done.send(result).is_err() {
                    debug!("Caller stopped waiting before the message was sent");
                }
            }
        }
    }

    /// Stamps the channel identity onto `message` and sends it.
    async fn send(&self, mut message: Message) -> Result<(), NotifyError> {
        stamp(&self.identity, &mut message);
        let result = self.transport.send(&message).await;
        match &result {
            Ok(()) => {
                metrics::counter!("slack_messages_sent_total", "status" => "success").increment(1);
            }
            Err(e) => {
                metrics::counter!("slack_messages_sent_total", "status" => e.label()).increment(1);
                if let Some(counters) = e.rate_limit() {
                    warn!(
                        second = counters.second,
                        minute = counters.minute,
                        hour = counters.hour,
                        "Slack is rate limiting, backing off"
                    );
                } else {
                    error!(error = %e, "Slack send failed");
                }
            }
        }
        result
    }
}

/// Applies the channel's display identity to an outgoing message.
pub fn stamp(identity: &ChannelConfig, message: &mut Message) {
    message.user_name = identity.username.clone();
    message.user_icon = identity.icon_url.clone();
    message.user_emoji = identity.icon_emoji.clone();
    message.channel = identity.channel.clone();
}
