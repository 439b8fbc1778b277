// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host contract.
//!
//! The scheduler never reads a platform clock, paints, or logs on its own.
//! A host wires it into an application by providing:
//!
//! - **Clock**: implements [`Clock`] over the platform's monotonic time
//!   source (`performance.now()`, `mach_absolute_time`, a test double).
//!
//! - **Commit sink**: implements [`CommitSink`] to apply resolved
//!   [`CommitBatch`]es to the visible surface. Batches arrive most urgent
//!   lane first and each one is applied as a whole.
//!
//! - **Error boundary**: implements [`ErrorBoundary`] to receive each
//!   [`Fault`] exactly once, together with the nearest task registered as a
//!   boundary through
//!   [`Scheduler::set_error_boundary`](crate::scheduler::Scheduler::set_error_boundary).
//!
//! - **Dependency sources**: hold [`SuspenseHandle`]s and call
//!   [`Scheduler::on_resolve`](crate::scheduler::Scheduler::on_resolve) or
//!   [`Scheduler::on_abort`](crate::scheduler::Scheduler::on_abort).
//!
//! [`SuspenseHandle`]: crate::suspense::SuspenseHandle
//!
//! # Host loop pseudocode
//!
//! ```rust,ignore
//! fn on_idle_callback() {
//!     let mut host = SliceHost::new(&clock, &mut surface, &mut boundary);
//!     let report = scheduler.run_slice(&mut host);
//!     if report.outcome == SliceOutcome::YieldedToHost {
//!         request_idle_callback(on_idle_callback);
//!     }
//! }
//! ```

use crate::commit::CommitBatch;
use crate::error::Fault;
use crate::task::{RootKey, TaskId};
use crate::time::HostTime;
use crate::trace::Tracer;

/// A monotonic time source.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> HostTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> HostTime {
        (**self).now()
    }
}

/// Applies resolved render subtrees to the visible surface.
pub trait CommitSink<O> {
    /// Applies a batch. The batch is complete; partial application must not
    /// become observable.
    fn apply(&mut self, batch: &CommitBatch<O>);
}

/// Receives faults raised while rendering.
pub trait ErrorBoundary {
    /// Called once per fault.
    fn on_fault(&mut self, report: &FaultReport);
}

/// A fault together with where it happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaultReport {
    /// The task that faulted (or timed out).
    pub task: TaskId,
    /// The render root the task belongs to.
    pub root: RootKey,
    /// The nearest ancestor registered as an error boundary, if any.
    pub boundary: Option<TaskId>,
    /// What went wrong.
    pub fault: Fault,
}

/// Everything the scheduler borrows from the host for one call.
pub struct SliceHost<'a, O> {
    /// Time source.
    pub clock: &'a dyn Clock,
    /// Destination for accepted batches.
    pub sink: &'a mut dyn CommitSink<O>,
    /// Destination for faults.
    pub boundary: &'a mut dyn ErrorBoundary,
    /// Instrumentation.
    pub tracer: Tracer<'a>,
}

impl<O> core::fmt::Debug for SliceHost<'_, O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SliceHost")
            .field("now", &self.clock.now())
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

impl<'a, O> SliceHost<'a, O> {
    /// Bundles host collaborators, with tracing disabled.
    pub fn new(
        clock: &'a dyn Clock,
        sink: &'a mut dyn CommitSink<O>,
        boundary: &'a mut dyn ErrorBoundary,
    ) -> Self {
        Self {
            clock,
            sink,
            boundary,
            tracer: Tracer::none(),
        }
    }

    /// Replaces the tracer.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer<'a>) -> Self {
        self.tracer = tracer;
        self
    }
}
