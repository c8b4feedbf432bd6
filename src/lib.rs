//! slacksink - relays application errors and messages to Slack
//!
//! This library provides a rate-aware notification sink: callers report
//! errors and messages concurrently, and one dispatcher per channel batches
//! and paces them against a Slack incoming webhook.

pub mod config;
pub mod core;
pub mod formatting;
pub mod notification;

// Re-export core types for convenience
pub use crate::core::*;
pub use notification::{NotifyError, PanicGuard, SlackChannel, WebhookTransport};
