//! Configuration management for slacksink
//!
//! This module defines the `Config` struct and its sub-structs. It uses the
//! `figment` crate to layer defaults, a TOML file and environment variables.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The main configuration struct.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Identity of the destination channel.
    pub channel: ChannelConfig,
    /// Dispatcher pacing and queue settings.
    pub dispatcher: DispatcherConfig,
}

/// Identity stamped onto every outgoing message.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ChannelConfig {
    /// The Slack incoming webhook URL.
    pub webhook_url: String,
    /// Display name of the bot.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub icon_emoji: String,
    /// Target room, e.g. `#ops` or `@someone`.
    #[serde(default)]
    pub channel: String,
}

/// Settings for the dispatcher worker. Delays are expressed in time units.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Length of one time unit in milliseconds.
    pub time_unit_ms: u64,
    /// Capacity of the error queue and the largest batch.
    pub max_errors: usize,
    /// Batches larger than this get a summary attachment.
    pub notify_threshold: usize,
    /// How long `send_message` waits for the dispatcher to accept.
    pub admission_timeout_units: u32,
    /// Cadence the worker starts at.
    pub baseline_units: u32,
    /// Minimum cadence after a rate-limited response.
    pub rate_limit_floor_units: u32,
    /// Decay stops here.
    pub decay_floor_units: u32,
    /// HTTP request timeout.
    pub request_timeout_seconds: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: 1000,
            max_errors: 80,
            notify_threshold: 10,
            admission_timeout_units: 5,
            baseline_units: 1,
            rate_limit_floor_units: 4,
            decay_floor_units: 2,
            request_timeout_seconds: 10,
        }
    }
}

impl DispatcherConfig {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn admission_timeout(&self) -> Duration {
        self.time_unit() * self.admission_timeout_units
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Config {
    /// Loads the configuration from the specified file.
    ///
    /// # Arguments
    /// * `config_path` - The path to the TOML configuration file.
    pub fn load(config_path: &str) -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // e.g. SLACKSINK_CHANNEL__WEBHOOK_URL=https://...
            .merge(Env::prefixed("SLACKSINK_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the dispatcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.channel.webhook_url.is_empty() {
            anyhow::bail!("channel.webhook_url must be set");
        }
        if self.dispatcher.time_unit_ms == 0 {
            anyhow::bail!("dispatcher.time_unit_ms must be greater than zero");
        }
        if self.dispatcher.max_errors == 0 {
            anyhow::bail!("dispatcher.max_errors must be greater than zero");
        }
        Ok(())
    }
}
