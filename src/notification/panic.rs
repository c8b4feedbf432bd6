//! Reports panics to Slack without swallowing them.

use crate::core::Colour;
use crate::formatting::prepare_attachment;
use crate::notification::SlackChannel;
use std::backtrace::Backtrace;
use tracing::{error, warn};

/// Reports a panic that unwinds through the scope holding this guard.
///
/// The guard only notifies; the unwind continues unchanged once it has been
/// dropped. The report is sent before the drop returns, through the same
/// path as a plain message and bounded by the admission timeout, so it is
/// delivered even when the process exits right after the unwind. Created by
/// [`SlackChannel::on_panic`].
#[must_use = "the guard reports panics only while it is alive"]
pub struct PanicGuard {
    channel: SlackChannel,
    context: String,
}

impl SlackChannel {
    /// Returns a guard that reports a panic in the current scope.
    pub fn on_panic(&self, context: &str) -> PanicGuard {
        PanicGuard {
            channel: self.clone(),
            context: context.to_string(),
        }
    }
}

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }

        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>");
        let backtrace = Backtrace::force_capture().to_string();
        error!(context = %self.context, thread = thread_name, "Panic detected, notifying Slack");

        let text = format!("Panic in {}", self.context);
        let report = prepare_attachment(
            &text,
            Colour::danger(),
            &[("Context", self.context.as_str()), ("Thread", thread_name)],
            &[("Backtrace", backtrace.as_str())],
        );
        if let Err(e) = self.channel.send_attachment_blocking(report) {
            warn!(error = %e, "Could not report panic to Slack");
        }
    }
}
