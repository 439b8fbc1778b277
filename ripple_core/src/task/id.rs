// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Task identity, render roots, generations, and status.

use core::fmt;

/// Sentinel value indicating "no task" in index fields.
pub(crate) const INVALID: u32 = u32::MAX;

/// A handle to a task in a [`TaskTree`](super::TaskTree).
///
/// Contains both a slot index and a slot epoch so that stale handles are
/// detected after a task is released and its slot reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId {
    /// Slot index into the tree's arrays.
    pub(crate) idx: u32,
    /// Slot epoch; must match the tree's epoch for this slot.
    pub(crate) epoch: u32,
}

impl TaskId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the slot epoch.
    #[inline]
    #[must_use]
    pub const fn epoch(self) -> u32 {
        self.epoch
    }

    /// Rebuilds a handle from its raw parts.
    ///
    /// Meant for decoding recorded traces; a handle built this way is only
    /// meaningful against the tree that issued it.
    #[inline]
    #[must_use]
    pub const fn from_raw(idx: u32, epoch: u32) -> Self {
        Self { idx, epoch }
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({}@{})", self.idx, self.epoch)
    }
}

/// Host-defined identity of a render root.
///
/// The scheduler never interprets the value. Hosts typically use the id of
/// the subtree root node that a mutation targets.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RootKey(pub u64);

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootKey({})", self.0)
    }
}

/// Render generation of a root.
///
/// Every new render request for a root (first admission, supersede,
/// re-render after commit) gets a strictly larger generation. Work tagged
/// with an older generation is stale.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    /// Generation of a root's first render.
    pub const FIRST: Self = Self(1);

    /// Returns the following generation.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.0)
    }
}

/// Lifecycle status of a task.
///
/// Legal transitions:
///
/// ```text
/// Pending ──► Active ──► Completed
///    ▲  │       │ │
///    │  │       │ └────► Suspended ──► Pending
///    │  │       ▼            │
///    │  └──► Aborted ◄───────┘
///    └────── Active   (Continue: back to the tail of its lane)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Waiting in the lane queue, possibly with saved resumable state.
    Pending,
    /// Currently executing its work.
    Active,
    /// Blocked on a suspense handle.
    Suspended,
    /// Finished; its output waits for commit.
    Completed,
    /// Cancelled by supersede, unmount, timeout, or a fault.
    Aborted,
}

impl TaskStatus {
    /// Returns whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Aborted)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Suspended)
                | (Self::Active, Self::Aborted)
                | (Self::Active, Self::Pending)
                | (Self::Suspended, Self::Pending)
                | (Self::Suspended, Self::Aborted)
        )
    }

    /// Returns whether the task has not yet produced a result and can still
    /// be cancelled.
    #[must_use]
    pub const fn is_unfinished(self) -> bool {
        matches!(self, Self::Pending | Self::Active | Self::Suspended)
    }
}
