// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Suspense handle registry.
//!
//! A [`SuspenseHandle`] names a pending external dependency (a data fetch, a
//! lazily loaded module). Work that cannot proceed without it returns
//! [`Step::Suspend`](crate::work::Step::Suspend) and the task parks here until
//! the dependency source calls
//! [`Scheduler::on_resolve`](crate::scheduler::Scheduler::on_resolve).
//!
//! Handles are issued by the tracker, so an id the tracker has never issued is
//! detectably bogus while an id it issued and has since resolved is a harmless
//! duplicate. A handle stays registered until its dependency resolves or is
//! cancelled; losing every waiter to supersession does not settle it.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::error::SchedError;
use crate::lane::Lane;
use crate::task::{Generation, TaskId};

/// Opaque token for a pending external dependency.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SuspenseHandle(u64);

impl SuspenseHandle {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Rebuilds a handle from a raw value (for decoding recorded traces).
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for SuspenseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SuspenseHandle({})", self.0)
    }
}

/// A task parked on a handle, with what it needs to be re-admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Waiter {
    pub(crate) task: TaskId,
    pub(crate) lane: Lane,
    pub(crate) generation: Generation,
}

#[derive(Clone, Debug)]
enum Entry {
    /// Issued, nobody waiting yet.
    Issued,
    /// One or more tasks are suspended on the handle.
    Blocking(Vec<Waiter>),
    /// Resolved before any task suspended on it.
    ResolvedEarly,
    /// The dependency was cancelled.
    Aborted,
}

/// Result of registering a suspended task on a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Registration {
    /// The task is parked until the handle resolves.
    Parked,
    /// The dependency already resolved; re-admit the task now.
    AlreadyResolved,
    /// The dependency was cancelled and will never resolve.
    Cancelled,
}

/// Result of resolving a handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// These tasks were waiting and should be re-admitted.
    Wake(Vec<Waiter>),
    /// No task was waiting; the next suspension on the handle re-admits
    /// immediately.
    Early,
    /// The handle had already been resolved or aborted.
    Duplicate,
}

/// Registry mapping suspense handles to the tasks blocked on them.
#[derive(Debug, Default)]
pub struct SuspenseTracker {
    next: u64,
    entries: HashMap<SuspenseHandle, Entry>,
}

impl SuspenseTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh handle.
    pub fn issue(&mut self) -> SuspenseHandle {
        let handle = SuspenseHandle(self.next);
        self.next += 1;
        self.entries.insert(handle, Entry::Issued);
        handle
    }

    /// Returns whether `handle` was issued by this tracker.
    #[must_use]
    pub fn was_issued(&self, handle: SuspenseHandle) -> bool {
        handle.0 < self.next
    }

    /// Returns the number of tasks currently parked.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.entries
            .values()
            .map(|e| match e {
                Entry::Blocking(w) => w.len(),
                _ => 0,
            })
            .sum()
    }

    /// Returns whether any task is parked on `handle`.
    #[must_use]
    pub fn is_blocking(&self, handle: SuspenseHandle) -> bool {
        matches!(self.entries.get(&handle), Some(Entry::Blocking(_)))
    }

    /// Parks a task on `handle`.
    ///
    /// A handle that already resolved tells the caller to re-admit the task
    /// at once. A cancelled handle parks nothing.
    pub(crate) fn register(
        &mut self,
        handle: SuspenseHandle,
        waiter: Waiter,
    ) -> Result<Registration, SchedError> {
        if !self.was_issued(handle) {
            return Err(SchedError::UnknownHandle(handle));
        }
        let Some(entry) = self.entries.get_mut(&handle) else {
            // Resolved with waiters, which retires the entry.
            return Ok(Registration::AlreadyResolved);
        };
        match entry {
            Entry::Issued => {
                *entry = Entry::Blocking(alloc::vec![waiter]);
                Ok(Registration::Parked)
            }
            Entry::Blocking(waiters) => {
                waiters.push(waiter);
                Ok(Registration::Parked)
            }
            Entry::ResolvedEarly => {
                self.entries.remove(&handle);
                Ok(Registration::AlreadyResolved)
            }
            Entry::Aborted => Ok(Registration::Cancelled),
        }
    }

    /// Resolves `handle`. Each waiter is returned at most once.
    pub(crate) fn resolve(&mut self, handle: SuspenseHandle) -> Result<Resolution, SchedError> {
        if !self.was_issued(handle) {
            return Err(SchedError::UnknownHandle(handle));
        }
        let Some(entry) = self.entries.get_mut(&handle) else {
            return Ok(Resolution::Duplicate);
        };
        match entry {
            Entry::Issued => {
                *entry = Entry::ResolvedEarly;
                Ok(Resolution::Early)
            }
            Entry::Blocking(waiters) => {
                let waiters = core::mem::take(waiters);
                self.entries.remove(&handle);
                Ok(Resolution::Wake(waiters))
            }
            Entry::ResolvedEarly | Entry::Aborted => Ok(Resolution::Duplicate),
        }
    }

    /// Marks `handle` cancelled without waking anyone. Returns whether the
    /// handle was still unsettled.
    pub(crate) fn abort(&mut self, handle: SuspenseHandle) -> bool {
        let Some(entry) = self.entries.get_mut(&handle) else {
            return false;
        };
        let unsettled = matches!(entry, Entry::Issued | Entry::Blocking(_));
        if unsettled {
            *entry = Entry::Aborted;
        }
        unsettled
    }

    /// Returns whether `handle` was cancelled.
    #[must_use]
    pub fn is_aborted(&self, handle: SuspenseHandle) -> bool {
        matches!(self.entries.get(&handle), Some(Entry::Aborted))
    }

    /// Drops `task` from the waiters of `handle`. The handle stays
    /// registered, so a later suspension on it parks again.
    pub(crate) fn forget(&mut self, handle: SuspenseHandle, task: TaskId) {
        let Some(Entry::Blocking(waiters)) = self.entries.get_mut(&handle) else {
            return;
        };
        waiters.retain(|w| w.task != task);
        if waiters.is_empty() {
            self.entries.insert(handle, Entry::Issued);
        }
    }
}
