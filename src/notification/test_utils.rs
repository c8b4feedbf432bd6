use crate::{
    core::{Message, RateLimitCounters, Transport},
    notification::NotifyError,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// A scripted outcome for the next send.
#[derive(Debug, Clone, Copy)]
pub enum FakeOutcome {
    Success,
    RateLimited { second: u32, minute: u32 },
    Status(u16),
}

/// Fake transport that records every message it is asked to send.
///
/// Responses are taken from a queue of scripted outcomes; once the queue is
/// empty every send succeeds. A gated transport holds each send until a
/// permit is released, which lets tests stall the dispatcher. Send times
/// come from the tokio clock, so they are exact under paused time.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Message>>>,
    sent_at: Arc<Mutex<Vec<Instant>>>,
    outcomes: Arc<Mutex<VecDeque<FakeOutcome>>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose sends block until `release` is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Lets `n` more sends through a gated transport.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Queues an outcome for a future send.
    pub fn push_outcome(&self, outcome: FakeOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    /// The messages sent so far, in send order.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    /// When each message was sent, in send order.
    pub fn send_times(&self) -> Vec<Instant> {
        self.sent_at.lock().unwrap().clone()
    }

    /// Polls until at least `count` messages were sent or `limit` elapses.
    pub async fn wait_for_messages(&self, count: usize, limit: Duration) -> Vec<Message> {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let sent = self.sent_messages();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: &Message) -> Result<(), NotifyError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.sent.lock().unwrap().push(message.clone());
        self.sent_at.lock().unwrap().push(Instant::now());

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FakeOutcome::Success);
        match outcome {
            FakeOutcome::Success => Ok(()),
            FakeOutcome::RateLimited { second, minute } => {
                Err(NotifyError::RateLimited(RateLimitCounters {
                    ok: false,
                    hour: 0,
                    minute,
                    second,
                }))
            }
            FakeOutcome::Status(code) => Err(NotifyError::Status(code)),
        }
    }
}
