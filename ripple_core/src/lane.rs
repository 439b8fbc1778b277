// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Priority lanes.
//!
//! A [`Lane`] is an ordinal urgency class. Lanes are totally ordered; the
//! derived [`Ord`] puts the most urgent lane first, so `Lane::Immediate <
//! Lane::Idle` and sorting a list of lanes yields service order.

use core::fmt;

/// An ordinal priority class for scheduled tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lane {
    /// Discrete input that must be reflected before the next paint (typing,
    /// clicks).
    Immediate,
    /// Continuous interaction feedback (drag, hover).
    UserBlocking,
    /// Default updates.
    Normal,
    /// Deferred, supersedable updates started through
    /// [`Scheduler::start_transition`](crate::scheduler::Scheduler::start_transition).
    Transition,
    /// Work that only runs when nothing else is pending.
    Idle,
}

impl Lane {
    /// Number of lanes.
    pub const COUNT: usize = 5;

    /// All lanes, most urgent first.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Immediate,
        Self::UserBlocking,
        Self::Normal,
        Self::Transition,
        Self::Idle,
    ];

    /// Returns the dense index of this lane (0 = most urgent).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Immediate => 0,
            Self::UserBlocking => 1,
            Self::Normal => 2,
            Self::Transition => 3,
            Self::Idle => 4,
        }
    }

    /// Returns the lane at the given dense index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Returns the next less urgent lane, if any.
    #[inline]
    #[must_use]
    pub const fn lower(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Returns whether `self` is served before `other` under strict priority.
    #[inline]
    #[must_use]
    pub const fn is_more_urgent_than(self, other: Self) -> bool {
        self.index() < other.index()
    }

    /// Short lowercase label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::UserBlocking => "user-blocking",
            Self::Normal => "normal",
            Self::Transition => "transition",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
