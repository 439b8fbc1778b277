// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bridge from scheduler trace events to the `tracing` ecosystem.
//!
//! [`TracingSink`] turns each event into a structured `tracing` event under
//! the `ripple` target. Routine per-slice events log at `TRACE`, queue and
//! commit decisions at `DEBUG`, budget changes at `INFO`, and faults at
//! `WARN`, so a subscriber filtered to `ripple=info` only sees what a human
//! would act on.

use tracing::{debug, info, trace, warn};

use ripple_core::trace::{
    BudgetChangeEvent, CommitEvent, DiscardEvent, FaultEvent, PhaseBeginEvent, PhaseEndEvent,
    SliceBeginEvent, SliceEndEvent, SliceSummary, StarvationBoostEvent, SuspenseEvent,
    TaskStartEvent, TaskStepEvent, TraceSink,
};

/// A [`TraceSink`] that emits `tracing` events.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates the sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TraceSink for TracingSink {
    fn on_slice_begin(&mut self, e: &SliceBeginEvent) {
        trace!(
            target: "ripple",
            slice = e.slice_index,
            now = e.now.ticks(),
            budget = e.budget.ticks(),
            queued = e.queued,
            "slice begin"
        );
    }

    fn on_slice_end(&mut self, e: &SliceEndEvent) {
        trace!(
            target: "ripple",
            slice = e.slice_index,
            now = e.now.ticks(),
            outcome = ?e.outcome,
            tasks_run = e.tasks_run,
            "slice end"
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        trace!(target: "ripple", slice = e.slice_index, phase = e.phase.as_str(), "phase begin");
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        trace!(target: "ripple", slice = e.slice_index, phase = e.phase.as_str(), "phase end");
    }

    fn on_discard(&mut self, e: &DiscardEvent) {
        debug!(
            target: "ripple",
            slice = e.slice_index,
            task = ?e.task,
            lane = e.lane.as_str(),
            reason = e.reason.as_str(),
            "discarded stale task"
        );
    }

    fn on_suspense(&mut self, e: &SuspenseEvent) {
        debug!(
            target: "ripple",
            slice = e.slice_index,
            handle = e.handle.raw(),
            task = ?e.task,
            kind = e.kind.as_str(),
            "suspense"
        );
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        match e.rejected() {
            None => debug!(
                target: "ripple",
                slice = e.slice_index,
                root = e.root.0,
                generation = e.generation.0,
                lane = e.lane.as_str(),
                entries = e.entries,
                "committed"
            ),
            Some(reason) => debug!(
                target: "ripple",
                slice = e.slice_index,
                root = e.root.0,
                generation = e.generation.0,
                reason = reason.as_str(),
                "commit rejected"
            ),
        }
    }

    fn on_fault(&mut self, e: &FaultEvent) {
        warn!(
            target: "ripple",
            slice = e.slice_index,
            task = ?e.task,
            root = e.root.0,
            boundary = ?e.boundary,
            kind = ?e.kind,
            "task faulted"
        );
    }

    fn on_starvation_boost(&mut self, e: &StarvationBoostEvent) {
        debug!(
            target: "ripple",
            slice = e.slice_index,
            from = e.from.as_str(),
            to = e.to.as_str(),
            "starvation boost"
        );
    }

    fn on_budget_change(&mut self, e: &BudgetChangeEvent) {
        info!(
            target: "ripple",
            slice = e.slice_index,
            old = e.old.ticks(),
            new = e.new.ticks(),
            elapsed_ema = e.elapsed_ema,
            "slice budget changed"
        );
    }

    fn on_slice_summary(&mut self, s: &SliceSummary) {
        trace!(
            target: "ripple",
            slice = s.slice_index,
            elapsed = s.elapsed.ticks(),
            budget = s.budget.ticks(),
            drain = s.drain_ticks,
            commit = s.commit_ticks,
            tasks_run = s.tasks_run,
            commits = s.commits,
            rejected = s.rejected,
            "slice summary"
        );
    }

    fn on_task_start(&mut self, e: &TaskStartEvent) {
        trace!(
            target: "ripple",
            slice = e.slice_index,
            task = ?e.task,
            lane = e.lane.as_str(),
            generation = e.generation.0,
            "task start"
        );
    }

    fn on_task_step(&mut self, e: &TaskStepEvent) {
        trace!(target: "ripple", slice = e.slice_index, task = ?e.task, step = ?e.step, "task step");
    }
}
