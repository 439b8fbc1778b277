// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Transition bookkeeping.
//!
//! A transition is a low-urgency render of a root that a newer mutation may
//! supersede at any time. The manager remembers, per root, which render task
//! carries the root's current transition so that
//! [`Scheduler::is_pending`](crate::scheduler::Scheduler::is_pending) can
//! answer without scanning the whole tree.

use core::fmt;

use hashbrown::HashMap;

use crate::task::{RootKey, TaskId, TaskStatus, TaskTree};

/// Identity of one [`start_transition`] call.
///
/// [`start_transition`]: crate::scheduler::Scheduler::start_transition
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionId(u64);

impl TransitionId {
    /// Returns the raw id.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransitionId({})", self.0)
    }
}

#[derive(Clone, Copy, Debug)]
struct Record {
    id: TransitionId,
    task: TaskId,
}

/// Per-root table of in-flight transitions.
#[derive(Debug, Default)]
pub struct TransitionManager {
    next: u64,
    active: HashMap<RootKey, Record>,
}

impl TransitionManager {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `task` as the render carrying a new transition for `root`,
    /// replacing any earlier one.
    pub(crate) fn begin(&mut self, root: RootKey, task: TaskId) -> TransitionId {
        self.next += 1;
        let id = TransitionId(self.next);
        self.active.insert(root, Record { id, task });
        id
    }

    /// Points the root's transition at a replacement render task.
    pub(crate) fn retarget(&mut self, root: RootKey, task: TaskId) {
        if let Some(record) = self.active.get_mut(&root) {
            record.task = task;
        }
    }

    /// Forgets the root's transition.
    pub(crate) fn clear(&mut self, root: RootKey) -> Option<TransitionId> {
        self.active.remove(&root).map(|r| r.id)
    }

    /// Forgets the root's transition if it is carried by `task`.
    pub(crate) fn clear_if(&mut self, root: RootKey, task: TaskId) {
        if self.active.get(&root).is_some_and(|r| r.task == task) {
            self.active.remove(&root);
        }
    }

    /// Returns the root's in-flight transition.
    #[must_use]
    pub fn transition_of(&self, root: RootKey) -> Option<TransitionId> {
        self.active.get(&root).map(|r| r.id)
    }

    /// Returns whether any task of the root's transition subtree is still
    /// `Pending` or `Active`.
    #[must_use]
    pub fn is_pending<O>(&self, root: RootKey, tree: &TaskTree<O>) -> bool {
        let Some(record) = self.active.get(&root) else {
            return false;
        };
        let Some(mut tasks) = tree.subtree(record.task) else {
            return false;
        };
        tasks.any(|t| {
            matches!(
                tree.status(t),
                Some(TaskStatus::Pending | TaskStatus::Active)
            )
        })
    }

    /// Number of roots with an in-flight transition.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns whether no transition is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
