// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy.
//!
//! Conditions fall into three groups:
//!
//! - **Benign**: stale-generation discards and superseded work. These never
//!   leave the scheduler; they show up only as trace events
//!   ([`DiscardReason`](crate::trace::DiscardReason),
//!   [`RejectReason`](crate::commit::RejectReason)).
//! - **Faults**: [`Fault::WorkClosure`] and [`Fault::SuspensionTimeout`]. Each
//!   is delivered exactly once to the host's
//!   [`ErrorBoundary`](crate::host::ErrorBoundary).
//! - **Misuse**: [`SchedError`]. Returned from API calls that cannot be
//!   honored. [`SchedError::InvariantViolation`] is a programmer error: it
//!   panics in debug builds and is a no-op in release builds.

use alloc::borrow::Cow;

use crate::suspense::SuspenseHandle;
use crate::task::{RootKey, TaskId, TaskStatus};
use crate::time::Duration;

/// Errors returned by scheduler API calls.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchedError {
    /// The task id is stale (its slot was released) or was never issued.
    #[error("task {0:?} is not alive")]
    UnknownTask(TaskId),
    /// The operation requires a `Pending` task.
    #[error("task {task:?} is {status:?}, expected Pending")]
    NotPending {
        /// The task the operation targeted.
        task: TaskId,
        /// Its status at the time of the call.
        status: TaskStatus,
    },
    /// The task was aborted and cannot take new children.
    #[error("task {0:?} was aborted")]
    Aborted(TaskId),
    /// The root has no live render task.
    #[error("root {0:?} has no live task")]
    NoLiveTask(RootKey),
    /// The suspense handle was never issued by this scheduler.
    #[error("suspense handle {0:?} was never issued")]
    UnknownHandle(SuspenseHandle),
    /// An internal invariant does not hold.
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
}

/// An unrecoverable error raised by a work closure.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("work fault: {message}")]
pub struct WorkFault {
    message: Cow<'static, str>,
}

impl WorkFault {
    /// Creates a fault with the given message.
    #[must_use]
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the fault message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A fault surfaced to the error boundary.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// The work closure returned an error.
    #[error(transparent)]
    WorkClosure(WorkFault),
    /// The host aborted a task that stayed suspended past its deadline.
    #[error("suspended for {waited:?} waiting on {handle:?}")]
    SuspensionTimeout {
        /// The handle the task was blocked on.
        handle: SuspenseHandle,
        /// How long the task had been suspended.
        waited: Duration,
    },
}

/// Checks an internal invariant.
///
/// Panics in debug builds; in release builds returns
/// `Err(SchedError::InvariantViolation)` from the enclosing function.
macro_rules! invariant {
    ($cond:expr, $msg:literal) => {
        if !$cond {
            debug_assert!($cond, $msg);
            return Err($crate::error::SchedError::InvariantViolation($msg));
        }
    };
}

pub(crate) use invariant;
