//! Relays application errors and messages to a rate-limited Slack webhook.
//!
//! Producers hand work to a [`SlackChannel`]; a single dispatcher worker per
//! channel batches queued errors, sends everything through a [`Transport`],
//! and paces itself according to the endpoint's rate-limit feedback.
//!
//! [`Transport`]: crate::core::Transport
pub mod backoff;
pub mod channel;
pub mod dispatcher;
pub mod panic;
pub mod queue;
pub mod slack;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::core::RateLimitCounters;
use thiserror::Error;

pub use channel::SlackChannel;
pub use panic::PanicGuard;
pub use slack::WebhookTransport;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("dispatcher overloaded: message not accepted within the admission timeout")]
    AdmissionTimeout,

    #[error("message accepted but not sent within the admission timeout")]
    OutcomeTimeout,

    #[error("too many errors: {dropped} error report(s) dropped")]
    QueueFull { dropped: u64 },

    #[error(
        "Slack rate limited the request ({} in the last second, {} in the last minute)",
        .0.second,
        .0.minute
    )]
    RateLimited(RateLimitCounters),

    #[error("Slack returned non-200 response code {0}")]
    Status(u16),

    #[error("HTTP request to Slack failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("dispatcher is not running")]
    DispatcherGone,

    #[error("send task failed: {0}")]
    Task(String),
}

impl NotifyError {
    /// The counters carried by a rate-limited response, if this is one.
    pub fn rate_limit(&self) -> Option<&RateLimitCounters> {
        match self {
            NotifyError::RateLimited(counters) => Some(counters),
            _ => None,
        }
    }

    /// Short label used for the `status` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            NotifyError::AdmissionTimeout => "admission_timeout",
            NotifyError::OutcomeTimeout => "outcome_timeout",
            NotifyError::QueueFull { .. } => "queue_full",
            NotifyError::RateLimited(_) => "rate_limited",
            NotifyError::Status(_) => "status",
            NotifyError::Http(_) => "http",
            NotifyError::Encode(_) => "encode",
            NotifyError::DispatcherGone => "dispatcher_gone",
            NotifyError::Task(_) => "task",
        }
    }
}
