// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic host doubles and metrics for exercising a ripple scheduler.
//!
//! - [`ManualClock`]: a clock that only moves when told to.
//! - [`RecordingSink`] / [`RecordingBoundary`]: keep every applied batch and
//!   every reported fault for later assertions.
//! - [`TestHost`]: bundles the three and runs slices.
//! - [`Script`]: work built from a list of actions (spend time, continue,
//!   suspend, finish, fail).
//! - [`StatsSink`]: a trace sink that counts scheduler events.
//! - [`SliceTracker`]: rolling slice-length history with a health grade.

#![no_std]

extern crate alloc;

mod host;
mod script;
mod stats;

pub use host::{AppliedBatch, ManualClock, RecordingBoundary, RecordingSink, TestHost};
pub use script::{Action, ExecLog, HandleSlot, Script};
pub use stats::{SliceGrade, SliceHealth, SliceTracker, StatsSink};
