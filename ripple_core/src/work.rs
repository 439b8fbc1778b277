// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resumable render work.
//!
//! Work is any value implementing [`Work`]. Each call to [`Work::step`] runs
//! until the work finishes, needs an external dependency, or notices through
//! [`Checkpoint::should_yield`] that the slice budget is spent. In the last
//! case it returns [`Step::Continue`] and keeps its own progress; the
//! scheduler re-enqueues it and calls `step` again in a later slice.
//!
//! [`from_fn`] wraps a closure of type
//! `FnMut(&mut Checkpoint<'_>) -> Result<Step<O>, WorkFault>` as [`Work`].

use crate::error::WorkFault;
use crate::host::Clock;
use crate::lane::Lane;
use crate::suspense::{SuspenseHandle, SuspenseTracker};
use crate::task::TaskId;
use crate::time::{Duration, HostTime};

/// Outcome of one call to [`Work::step`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step<O> {
    /// The unit finished and produced its output.
    Done(O),
    /// The unit cannot proceed until `handle` resolves.
    Suspend(SuspenseHandle),
    /// The unit yielded at a checkpoint and has more to do.
    Continue,
}

/// A resumable unit of render work.
pub trait Work<O> {
    /// Advances the work.
    ///
    /// Long-running work should poll [`Checkpoint::should_yield`] at safe
    /// points and return [`Step::Continue`] once it reports `true`.
    fn step(&mut self, cx: &mut Checkpoint<'_>) -> Result<Step<O>, WorkFault>;
}

/// Work backed by a closure. Created by [`from_fn`].
pub struct FromFn<F>(F);

impl<F> core::fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

/// Wraps a closure as [`Work`].
///
/// The closure is the work's whole resumable state; anything it captures by
/// value survives between steps.
pub fn from_fn<O, F>(f: F) -> FromFn<F>
where
    F: FnMut(&mut Checkpoint<'_>) -> Result<Step<O>, WorkFault>,
{
    FromFn(f)
}

impl<O, F> Work<O> for FromFn<F>
where
    F: FnMut(&mut Checkpoint<'_>) -> Result<Step<O>, WorkFault>,
{
    fn step(&mut self, cx: &mut Checkpoint<'_>) -> Result<Step<O>, WorkFault> {
        (self.0)(cx)
    }
}

/// The view of the running slice handed to [`Work::step`].
pub struct Checkpoint<'a> {
    clock: &'a dyn Clock,
    deadline: HostTime,
    task: TaskId,
    lane: Lane,
    handles: &'a mut SuspenseTracker,
    polls: u32,
}

impl core::fmt::Debug for Checkpoint<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Checkpoint")
            .field("deadline", &self.deadline)
            .field("task", &self.task)
            .field("lane", &self.lane)
            .field("polls", &self.polls)
            .finish_non_exhaustive()
    }
}

impl<'a> Checkpoint<'a> {
    pub(crate) fn new(
        clock: &'a dyn Clock,
        deadline: HostTime,
        task: TaskId,
        lane: Lane,
        handles: &'a mut SuspenseTracker,
    ) -> Self {
        Self {
            clock,
            deadline,
            task,
            lane,
            handles,
            polls: 0,
        }
    }

    /// Returns whether the slice budget is spent and the work should return
    /// [`Step::Continue`] at the next safe point.
    pub fn should_yield(&mut self) -> bool {
        self.polls += 1;
        self.clock.now() >= self.deadline
    }

    /// Returns the time left in the slice.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(self.clock.now())
    }

    /// Returns the current host time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.clock.now()
    }

    /// Issues a handle for a dependency this work is about to wait on.
    pub fn create_handle(&mut self) -> SuspenseHandle {
        self.handles.issue()
    }

    /// The task being run.
    #[must_use]
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// The lane the task runs in.
    #[must_use]
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Number of [`should_yield`](Self::should_yield) polls during this step.
    #[must_use]
    pub fn polls(&self) -> u32 {
        self.polls
    }
}
