//! Fixed-rate sample clock.
//!
//! Decouples the rate at which touch/sensor events arrive from the rate at
//! which analog telemetry goes on the wire. Missed ticks are skipped rather
//! than replayed in a burst.

use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

pub const DEFAULT_TICK_RATE_HZ: f64 = 60.0;
pub const MIN_TICK_RATE_HZ: f64 = 1.0;
pub const MAX_TICK_RATE_HZ: f64 = 1000.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ClockError {
    #[error("Tick rate must be between 1 and 1000 Hz, got {0}")]
    InvalidRate(f64),
}

/// Period of one tick at `rate_hz`.
pub fn period_for(rate_hz: f64) -> Result<Duration, ClockError> {
    if !(MIN_TICK_RATE_HZ..=MAX_TICK_RATE_HZ).contains(&rate_hz) {
        return Err(ClockError::InvalidRate(rate_hz));
    }
    match Duration::try_from_secs_f64(1.0 / rate_hz) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(ClockError::InvalidRate(rate_hz)),
    }
}

#[derive(Debug)]
pub struct SampleClock {
    interval: Interval,
    ticks: u64,
}

impl SampleClock {
    /// Must be created inside a tokio runtime.
    pub fn new(rate_hz: f64) -> Result<Self, ClockError> {
        let period = period_for(rate_hz)?;
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!("Sample clock at {} Hz ({:?} per tick)", rate_hz, period);
        Ok(Self { interval, ticks: 0 })
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Waits for the next tick and returns its sequence number.
    pub async fn tick(&mut self) -> u64 {
        self.interval.tick().await;
        self.ticks += 1;
        self.ticks
    }
}
