//! Core message types and service traits for slacksink
//!
//! This module defines the wire envelope sent to the webhook and the
//! transport contract the dispatcher sends it through.

use crate::notification::NotifyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Colour of an attachment's side bar.
///
/// Slack accepts one of `good`, `warning`, `danger`, or any hex colour code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Colour(pub String);

impl Colour {
    pub fn good() -> Self {
        Self("good".to_string())
    }

    pub fn warning() -> Self {
        Self("warning".to_string())
    }

    pub fn danger() -> Self {
        Self("danger".to_string())
    }

    /// A custom hex colour, e.g. `#439FE0`.
    pub fn hex(code: &str) -> Self {
        Self(code.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The envelope POSTed to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Message {
    #[serde(rename = "username", skip_serializing_if = "String::is_empty", default)]
    pub user_name: String,
    #[serde(rename = "icon_url", skip_serializing_if = "String::is_empty", default)]
    pub user_icon: String,
    #[serde(rename = "icon_emoji", skip_serializing_if = "String::is_empty", default)]
    pub user_emoji: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub channel: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub text: String,
}

impl Message {
    /// Wraps a list of attachments into an envelope with no identity set.
    pub fn from_attachments(attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Default::default()
        }
    }
}

/// A structured block of a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Attachment {
    pub fallback: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub text: String,
    #[serde(rename = "color", skip_serializing_if = "Colour::is_empty", default)]
    pub colour: Colour,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<Field>,
}

/// A labeled value within an attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Field {
    /// May not contain markup; Slack escapes it.
    pub title: String,
    /// May contain standard message markup and span multiple lines.
    pub value: String,
    /// Short fields are displayed side-by-side.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub short: bool,
}

impl Field {
    pub fn new(title: &str, value: &str, short: bool) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            short,
        }
    }
}

/// Display order of fields: short fields first, then by title.
pub fn field_order(a: &Field, b: &Field) -> Ordering {
    b.short
        .cmp(&a.short)
        .then_with(|| a.title.cmp(&b.title))
}

/// Usage counters Slack returns alongside a 429 response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RateLimitCounters {
    #[serde(default)]
    pub ok: bool,
    #[serde(rename = "count_hour_ago", default)]
    pub hour: u32,
    #[serde(rename = "count_minute_ago", default)]
    pub minute: u32,
    #[serde(rename = "count_second_ago", default)]
    pub second: u32,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Sends one fully stamped message to the remote endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs exactly one request/response exchange.
    ///
    /// # Returns
    /// * `Ok(())` for any 2xx response
    /// * `Err(NotifyError::RateLimited)` for a 429 with decoded counters
    /// * `Err` for any other status or transport failure
    async fn send(&self, message: &Message) -> Result<(), NotifyError>;
}
