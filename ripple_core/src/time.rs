// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host time used for slice budgets.
//!
//! The scheduler never reads a platform clock. The host's
//! [`Clock`](crate::host::Clock) returns [`HostTime`] in whatever monotonic
//! tick it has at hand, and budgets are [`Duration`]s of the same tick. The
//! [`SchedulerConfig`](crate::scheduler::SchedulerConfig) presets assume
//! nanosecond ticks; hosts with a coarser clock should scale their budgets.
//!
//! All arithmetic saturates. A clock that steps backwards yields zero-length
//! intervals rather than a panic.

use core::fmt;

/// A point on the host's monotonic clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`; zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// `self + duration`, pinned at the end of time.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.0))
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

/// A span of host ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// No time at all.
    pub const ZERO: Self = Self(0);

    /// `ms` milliseconds on a nanosecond clock.
    #[inline]
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000_000))
    }

    /// Raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns whether the span is empty.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Sum, pinned at the largest span.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Difference, pinned at zero.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Pins the span into `[min, max]`. `min` wins if the bounds cross.
    #[inline]
    #[must_use]
    pub const fn clamp_to(self, min: Self, max: Self) -> Self {
        if self.0 > max.0 {
            if max.0 < min.0 { min } else { max }
        } else if self.0 < min.0 {
            min
        } else {
            self
        }
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}t", self.0)
    }
}

/// Tick length, for turning host time into wall units in diagnostics.
#[derive(Clone, Copy, PartialEq)]
pub struct Timebase {
    nanos_per_tick: f64,
}

impl Timebase {
    /// Ticks are nanoseconds.
    pub const NANOS: Self = Self {
        nanos_per_tick: 1.0,
    };

    /// Ticks are microseconds.
    pub const MICROS: Self = Self {
        nanos_per_tick: 1_000.0,
    };

    /// A tick of `nanos_per_tick` nanoseconds, e.g. `1e9 / 24e6` for a
    /// 24 MHz counter.
    ///
    /// # Panics
    ///
    /// Panics if `nanos_per_tick` is not a positive finite number.
    #[must_use]
    pub fn from_nanos_per_tick(nanos_per_tick: f64) -> Self {
        assert!(
            nanos_per_tick.is_finite() && nanos_per_tick > 0.0,
            "tick length must be positive and finite"
        );
        Self { nanos_per_tick }
    }

    /// `ticks` in microseconds, the unit trace viewers expect.
    #[inline]
    #[must_use]
    pub fn ticks_to_micros(self, ticks: u64) -> f64 {
        ticks as f64 * self.nanos_per_tick / 1_000.0
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}ns/tick)", self.nanos_per_tick)
    }
}
