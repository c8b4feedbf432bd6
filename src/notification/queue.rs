//! The bounded error queue and its drop counter.
//!
//! Producers push formatted error attachments without ever blocking. When the
//! queue is full the event is dropped and counted; the dispatcher reads and
//! clears that count each time it assembles a batch.

use crate::core::Attachment;
use crate::formatting::summary_attachment;
use crate::notification::NotifyError;
use async_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{debug, warn};

/// Creates a bounded error queue holding at most `max_errors` events.
pub fn error_queue(max_errors: usize, notify_threshold: usize) -> (ErrorSender, ErrorBatcher) {
    let (tx, rx) = async_channel::bounded(max_errors.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        ErrorSender {
            tx,
            dropped: dropped.clone(),
        },
        ErrorBatcher {
            rx,
            dropped,
            max_errors,
            notify_threshold,
        },
    )
}

/// The producer side of the error queue.
#[derive(Debug, Clone)]
pub struct ErrorSender {
    tx: Sender<Attachment>,
    dropped: Arc<AtomicU64>,
}

impl ErrorSender {
    /// Enqueues an event without blocking.
    ///
    /// # Returns
    /// * `Err(NotifyError::QueueFull)` with the number of events dropped since
    ///   the dispatcher last assembled a batch
    pub fn push(&self, event: Attachment) -> Result<(), NotifyError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::counter!("slack_errors_dropped_total").increment(1);
                warn!(dropped, "Error queue full, dropping error report");
                Err(NotifyError::QueueFull { dropped })
            }
            Err(TrySendError::Closed(_)) => Err(NotifyError::DispatcherGone),
        }
    }

    /// Number of events currently waiting.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// The dispatcher side of the error queue.
#[derive(Debug)]
pub struct ErrorBatcher {
    rx: Receiver<Attachment>,
    dropped: Arc<AtomicU64>,
    max_errors: usize,
    notify_threshold: usize,
}

impl ErrorBatcher {
    /// Waits for the next event. Returns `None` once every sender is gone.
    pub async fn recv(&self) -> Option<Attachment> {
        self.rx.recv().await.ok()
    }

    /// Pops everything currently queued, in arrival order, up to `max_errors`
    /// events including `seed`.
    pub fn drain_available(&self, seed: Option<Attachment>) -> Vec<Attachment> {
        let mut events = Vec::with_capacity(self.rx.len() + 1);
        events.extend(seed);
        while events.len() < self.max_errors {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }

    /// Turns drained events into a batch, prepending a summary when the batch
    /// is large or events were dropped since the previous call.
    pub fn assemble(&self, mut events: Vec<Attachment>) -> Vec<Attachment> {
        let dropped = self.take_dropped();
        if events.len() > self.notify_threshold || dropped > 0 {
            debug!(events = events.len(), dropped, "Prepending error summary");
            events.insert(0, summary_attachment(dropped));
        }
        events
    }

    /// Reads and clears the drop counter.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::SeqCst)
    }
}
