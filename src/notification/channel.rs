//! The caller-facing handle of a Slack channel.
//!
//! A `SlackChannel` owns the producer side of one dispatcher. Plain messages
//! are handed over with a bounded wait; error reports are queued without
//! blocking. The dispatcher is started on first use.

use crate::config::{ChannelConfig, Config, DispatcherConfig};
use crate::core::{Attachment, Colour, Message, Transport};
use crate::formatting::{prepare_attachment, NIL_ERROR_TEXT};
use crate::notification::dispatcher::{Dispatcher, PlainMessage};
use crate::notification::queue::{error_queue, ErrorSender};
use crate::notification::slack::WebhookTransport;
use crate::notification::NotifyError;
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// How often a blocking sender re-checks the inbox and the outcome.
const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// A configured Slack destination with its own dispatcher.
///
/// Cloning is cheap; every clone feeds the same dispatcher.
#[derive(Clone)]
pub struct SlackChannel {
    inner: Arc<Inner>,
}

struct Inner {
    identity: ChannelConfig,
    config: DispatcherConfig,
    errors: ErrorSender,
    inbox: mpsc::Sender<PlainMessage>,
    start: Once,
    idle: Mutex<Option<Dispatcher>>,
}

impl SlackChannel {
    /// Creates a channel that posts to the configured webhook.
    pub fn new(config: &Config) -> Self {
        let transport = WebhookTransport::new(
            config.channel.webhook_url.clone(),
            config.dispatcher.request_timeout(),
        );
        Self::with_transport(
            config.channel.clone(),
            config.dispatcher.clone(),
            Arc::new(transport),
        )
    }

    /// Creates a channel that sends through `transport`.
    pub fn with_transport(
        identity: ChannelConfig,
        config: DispatcherConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (errors, batcher) = error_queue(config.max_errors, config.notify_threshold);
        let (inbox, inbox_rx) = mpsc::channel(1);
        let dispatcher = Dispatcher::new(identity.clone(), &config, transport, batcher, inbox_rx);

        Self {
            inner: Arc::new(Inner {
                identity,
                config,
                errors,
                inbox,
                start: Once::new(),
                idle: Mutex::new(Some(dispatcher)),
            }),
        }
    }

    pub fn identity(&self) -> &ChannelConfig {
        &self.inner.identity
    }

    /// Sends a message and waits for the dispatcher's verdict.
    ///
    /// # Returns
    /// * `Err(NotifyError::AdmissionTimeout)` if the dispatcher did not accept
    ///   the message within the admission timeout
    /// * the transport outcome otherwise
    pub async fn send_message(
        &self,
        text: &str,
        colour: Colour,
        short_fields: &[(&str, &str)],
        long_fields: &[(&str, &str)],
    ) -> Result<(), NotifyError> {
        let attachment = prepare_attachment(text, colour, short_fields, long_fields);
        self.send_attachment(attachment).await
    }

    /// Sends a prebuilt attachment and waits for the dispatcher's verdict.
    #[instrument(skip_all, fields(channel = %self.inner.identity.channel))]
    pub async fn send_attachment(&self, attachment: Attachment) -> Result<(), NotifyError> {
        self.ensure_started();

        let (done, outcome) = oneshot::channel();
        let message = PlainMessage {
            message: Message::from_attachments(vec![attachment]),
            done,
        };

        // The timeout only bounds the handoff, not the send itself.
        match timeout(self.inner.config.admission_timeout(), self.inner.inbox.send(message)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(NotifyError::DispatcherGone),
            Err(_) => {
                metrics::counter!("slack_admission_timeouts_total").increment(1);
                warn!("Dispatcher did not accept the message in time");
                return Err(NotifyError::AdmissionTimeout);
            }
        }

        outcome.await.unwrap_or(Err(NotifyError::DispatcherGone))
    }

    /// Blocking counterpart of [`send_attachment`](Self::send_attachment).
    ///
    /// Parks the calling thread until the dispatcher has sent the attachment
    /// or the admission timeout has elapsed, whichever comes first. The whole
    /// call, handoff and outcome together, is bounded by that one timeout.
    /// Safe to call from inside a tokio runtime because the dispatcher runs on
    /// its own thread, but it does block the calling worker while it waits.
    ///
    /// # Returns
    /// * `Err(NotifyError::AdmissionTimeout)` if the inbox stayed full
    /// * `Err(NotifyError::OutcomeTimeout)` if the message was accepted but
    ///   not sent before the deadline
    /// * the transport outcome otherwise
    pub fn send_attachment_blocking(&self, attachment: Attachment) -> Result<(), NotifyError> {
        self.ensure_started();
        let deadline = Instant::now() + self.inner.config.admission_timeout();

        let (done, mut outcome) = oneshot::channel();
        let mut message = PlainMessage {
            message: Message::from_attachments(vec![attachment]),
            done,
        };

        loop {
            match self.inner.inbox.try_send(message) {
                Ok(()) => break,
                Err(TrySendError::Closed(_)) => return Err(NotifyError::DispatcherGone),
                Err(TrySendError::Full(returned)) => {
                    if Instant::now() >= deadline {
                        metrics::counter!("slack_admission_timeouts_total").increment(1);
                        warn!("Dispatcher did not accept the message in time");
                        return Err(NotifyError::AdmissionTimeout);
                    }
                    message = returned;
                    std::thread::sleep(BLOCKING_POLL_INTERVAL);
                }
            }
        }

        // blocking_recv panics inside a runtime, so poll instead.
        loop {
            match outcome.try_recv() {
                Ok(result) => return result,
                Err(TryRecvError::Closed) => return Err(NotifyError::DispatcherGone),
                Err(TryRecvError::Empty) => {
                    if Instant::now() >= deadline {
                        warn!("Dispatcher accepted the message but did not send it in time");
                        return Err(NotifyError::OutcomeTimeout);
                    }
                    std::thread::sleep(BLOCKING_POLL_INTERVAL);
                }
            }
        }
    }

    /// Queues an error report without blocking.
    ///
    /// A `None` error is reported as a synthetic event rather than rejected.
    ///
    /// # Returns
    /// * `Err(NotifyError::QueueFull)` with the cumulative drop count if the
    ///   queue is saturated
    pub fn send_error(
        &self,
        error: Option<&dyn fmt::Display>,
        colour: Colour,
        short_fields: &[(&str, &str)],
        long_fields: &[(&str, &str)],
    ) -> Result<(), NotifyError> {
        self.ensure_started();

        let text = match error {
            Some(error) => error.to_string(),
            None => NIL_ERROR_TEXT.to_string(),
        };
        let event = prepare_attachment(&text, colour, short_fields, long_fields);
        self.inner.errors.push(event)
    }

    /// Logs a warning and reports it with the caller's location.
    #[track_caller]
    pub fn warning(&self, message: impl fmt::Display) -> Result<(), NotifyError> {
        let location = Location::caller();
        let caller = format!("{}:{}", location.file(), location.line());
        warn!(caller = %caller, "{}", message);
        self.send_error(Some(&message), Colour::warning(), &[("Caller", caller.as_str())], &[])
    }

    /// Starts the dispatcher on its own thread, exactly once.
    fn ensure_started(&self) {
        self.inner.start.call_once(|| {
            let dispatcher = match self.inner.idle.lock() {
                Ok(mut idle) => idle.take(),
                Err(poisoned) => poisoned.into_inner().take(),
            };
            let Some(dispatcher) = dispatcher else {
                return;
            };

            debug!(channel = %self.inner.identity.channel, "Spawning Slack dispatcher thread");
            let spawned = std::thread::Builder::new()
                .name("slack-dispatcher".to_string())
                .spawn(move || {
                    match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime.block_on(dispatcher.run()),
                        Err(e) => error!(error = %e, "Failed to build dispatcher runtime"),
                    }
                });

            match spawned {
                Ok(_) => info!("Slack dispatcher thread started."),
                Err(e) => error!(error = %e, "Failed to spawn Slack dispatcher thread"),
            }
        });
    }
}

impl fmt::Debug for SlackChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackChannel")
            .field("identity", &self.inner.identity)
            .field("queued_errors", &self.inner.errors.len())
            .finish()
    }
}
