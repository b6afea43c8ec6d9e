//! Logical simulation clock
//!
//! The engine is driven by a logical clock, not wall-clock time (spec.md
//! Non-goals). `SimInstant` counts whole minutes since the run's configured
//! base instant; `SimDuration` is the corresponding delta.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub};

/// Minutes since the run's base instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimInstant(u64);

impl SimInstant {
    pub const ZERO: SimInstant = SimInstant(0);

    pub fn from_minutes(minutes: u64) -> Self {
        Self(minutes)
    }

    pub fn as_minutes(&self) -> u64 {
        self.0
    }

    pub fn as_hours_f64(&self) -> f64 {
        self.0 as f64 / 60.0
    }

    pub fn wall_clock(&self, base: DateTime<Utc>) -> DateTime<Utc> {
        base + chrono::Duration::minutes(self.0 as i64)
    }
}

impl Add<SimDuration> for SimInstant {
    type Output = SimInstant;
    fn add(self, rhs: SimDuration) -> SimInstant {
        SimInstant(self.0 + rhs.0)
    }
}

impl AddAssign<SimDuration> for SimInstant {
    fn add_assign(&mut self, rhs: SimDuration) {
        self.0 += rhs.0;
    }
}

impl Sub for SimInstant {
    type Output = SimDuration;
    fn sub(self, rhs: SimInstant) -> SimDuration {
        SimDuration(self.0.saturating_sub(rhs.0))
    }
}

/// A span of simulated minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimDuration(u64);

impl SimDuration {
    pub fn minutes(m: u64) -> Self {
        Self(m)
    }

    pub fn hours(h: u64) -> Self {
        Self(h * 60)
    }

    pub fn as_minutes(&self) -> u64 {
        self.0
    }

    pub fn as_hours_f64(&self) -> f64 {
        self.0 as f64 / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_arithmetic_round_trips() {
        let start = SimInstant::from_minutes(100);
        let later = start + SimDuration::hours(2);
        assert_eq!(later.as_minutes(), 220);
        assert_eq!(later - start, SimDuration::minutes(120));
    }

    #[test]
    fn subtraction_saturates_instead_of_underflowing() {
        let earlier = SimInstant::from_minutes(10);
        let later = SimInstant::from_minutes(50);
        assert_eq!((earlier - later).as_minutes(), 0);
    }

    #[test]
    fn add_assign_advances_in_place() {
        let mut t = SimInstant::ZERO;
        t += SimDuration::minutes(45);
        t += SimDuration::minutes(45);
        assert_eq!(t.as_hours_f64(), 1.5);
    }
}
