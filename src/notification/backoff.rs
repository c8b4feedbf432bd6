//! Adaptive pacing of the dispatcher.
//!
//! After every send the dispatcher feeds the outcome in here and sleeps for
//! the returned cadence before the next one.

use crate::config::DispatcherConfig;
use crate::notification::NotifyError;
use std::time::Duration;

/// Tracks the dispatcher's current minimum delay between sends.
#[derive(Debug, Clone)]
pub struct Backoff {
    cadence: Duration,
    unit: Duration,
    rate_limit_floor: Duration,
    decay_floor: Duration,
}

impl Backoff {
    pub fn new(config: &DispatcherConfig) -> Self {
        let unit = config.time_unit();
        Self {
            cadence: unit * config.baseline_units,
            unit,
            rate_limit_floor: unit * config.rate_limit_floor_units,
            decay_floor: unit * config.decay_floor_units,
        }
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// The cadence expressed in time units.
    pub fn cadence_units(&self) -> f64 {
        if self.unit.is_zero() {
            return 0.0;
        }
        self.cadence.as_secs_f64() / self.unit.as_secs_f64()
    }

    /// Updates the cadence from the outcome of the last send and returns it.
    pub fn observe(&mut self, outcome: &Result<(), NotifyError>) -> Duration {
        self.cadence = next_cadence(
            self.cadence,
            outcome,
            self.unit,
            self.rate_limit_floor,
            self.decay_floor,
        );
        self.cadence
    }
}

/// Computes the next cadence.
///
/// A rate-limited outcome raises the cadence in proportion to the traffic the
/// endpoint reports; anything else decays it by one unit, never below
/// `decay_floor`.
pub fn next_cadence(
    current: Duration,
    outcome: &Result<(), NotifyError>,
    unit: Duration,
    rate_limit_floor: Duration,
    decay_floor: Duration,
) -> Duration {
    if let Some(counters) = outcome.as_ref().err().and_then(NotifyError::rate_limit) {
        let per_second = unit * counters.second;
        let per_minute = unit * counters.minute / 60;
        return rate_limit_floor.max(per_second).max(per_minute);
    }

    if current > decay_floor {
        current.saturating_sub(unit).max(decay_floor)
    } else {
        current
    }
}
