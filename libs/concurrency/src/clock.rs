//! Manager clocks
//!
//! The manager drives two independent time domains. Real time is read from
//! the OS monotonic clock once per dispatch iteration; logical ("game") time
//! only moves when the host advances it.

use crate::fatal_assert;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Which manager clock drives an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeDomain {
    RealTime,
    Logical,
}

/// Elapsed seconds in both domains since the last reset
#[derive(Debug)]
pub struct ManagerClock {
    real_base: Instant,
    real_elapsed: f64,
    logical_elapsed: f64,
}

impl ManagerClock {
    pub fn new() -> Self {
        Self {
            real_base: Instant::now(),
            real_elapsed: 0.0,
            logical_elapsed: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.real_base = Instant::now();
        self.real_elapsed = 0.0;
        self.logical_elapsed = 0.0;
    }

    /// Sample the monotonic clock
    pub fn advance_real(&mut self) -> f64 {
        self.real_elapsed = self.real_base.elapsed().as_secs_f64();
        self.real_elapsed
    }

    pub fn advance_logical(&mut self, delta: f64) -> f64 {
        fatal_assert!(delta >= 0.0, "logical time cannot move backwards ({})", delta);
        self.logical_elapsed += delta;
        self.logical_elapsed
    }

    pub fn set_logical(&mut self, elapsed: f64) {
        fatal_assert!(
            elapsed >= self.logical_elapsed,
            "logical time cannot move backwards ({} -> {})",
            self.logical_elapsed,
            elapsed
        );
        self.logical_elapsed = elapsed;
    }

    pub fn real_elapsed(&self) -> f64 {
        self.real_elapsed
    }

    pub fn logical_elapsed(&self) -> f64 {
        self.logical_elapsed
    }

    pub fn elapsed(&self, domain: TimeDomain) -> f64 {
        match domain {
            TimeDomain::RealTime => self.real_elapsed,
            TimeDomain::Logical => self.logical_elapsed,
        }
    }
}

impl Default for ManagerClock {
    fn default() -> Self {
        Self::new()
    }
}
