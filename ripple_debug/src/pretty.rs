// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Line-oriented trace output for terminals and logs.
//!
//! Every event becomes one line tagged with its kind in brackets, e.g.
//! `[commit] slice=3 root=7 gen=2 ...`. Times are printed in microseconds.

use std::io::Write;

use ripple_core::time::{HostTime, Timebase};
use ripple_core::trace::{
    BudgetChangeEvent, CommitEvent, DiscardEvent, FaultEvent, PhaseBeginEvent, PhaseEndEvent,
    SliceBeginEvent, SliceEndEvent, SliceSummary, StarvationBoostEvent, SuspenseEvent,
    TaskStartEvent, TaskStepEvent, TraceSink,
};

/// A [`TraceSink`] that prints one line per scheduler event.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Prints to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }

    /// Prints to `writer`.
    #[must_use]
    pub fn new(writer: Box<dyn Write>, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Prints to `writer`, keeping its concrete type for [`into_inner`](Self::into_inner).
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Consumes the sink and returns its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn micros(&self, ticks: u64) -> f64 {
        self.timebase.ticks_to_micros(ticks)
    }

    fn host_us(&self, t: HostTime) -> f64 {
        self.micros(t.ticks())
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_slice_begin(&mut self, e: &SliceBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[slice] #{} at {:.1}µs budget={:.1}µs queued={}",
            e.slice_index,
            self.host_us(e.now),
            self.micros(e.budget.ticks()),
            e.queued,
        );
    }

    fn on_slice_end(&mut self, e: &SliceEndEvent) {
        let _ = writeln!(
            self.writer,
            "[slice:end] #{} at {:.1}µs {:?} tasks={}",
            e.slice_index,
            self.host_us(e.now),
            e.outcome,
            e.tasks_run,
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] slice={} {} at {:.1}µs",
            e.slice_index,
            e.phase.as_str(),
            self.host_us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] slice={} {} at {:.1}µs",
            e.slice_index,
            e.phase.as_str(),
            self.host_us(e.timestamp),
        );
    }

    fn on_discard(&mut self, e: &DiscardEvent) {
        let _ = writeln!(
            self.writer,
            "[discard] slice={} {:?} lane={} {}",
            e.slice_index,
            e.task,
            e.lane,
            e.reason.as_str(),
        );
    }

    fn on_suspense(&mut self, e: &SuspenseEvent) {
        let _ = writeln!(
            self.writer,
            "[suspense] slice={} {:?} task={:?} {}",
            e.slice_index,
            e.handle,
            e.task,
            e.kind.as_str(),
        );
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        let verdict = e.rejected().map_or("ok", |r| r.as_str());
        let _ = writeln!(
            self.writer,
            "[commit] slice={} root={} gen={} lane={} entries={} {verdict}",
            e.slice_index, e.root.0, e.generation.0, e.lane, e.entries,
        );
    }

    fn on_fault(&mut self, e: &FaultEvent) {
        let _ = writeln!(
            self.writer,
            "[fault] slice={} {:?} root={} boundary={:?} {:?}",
            e.slice_index, e.task, e.root.0, e.boundary, e.kind,
        );
    }

    fn on_starvation_boost(&mut self, e: &StarvationBoostEvent) {
        let _ = writeln!(
            self.writer,
            "[boost] slice={} {} -> {}",
            e.slice_index, e.from, e.to,
        );
    }

    fn on_budget_change(&mut self, e: &BudgetChangeEvent) {
        let _ = writeln!(
            self.writer,
            "[budget] slice={} {:.1}µs -> {:.1}µs ema={:.1}µs",
            e.slice_index,
            self.micros(e.old.ticks()),
            self.micros(e.new.ticks()),
            self.micros(e.elapsed_ema),
        );
    }

    fn on_slice_summary(&mut self, s: &SliceSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] slice={} elapsed={:.1}µs/{:.1}µs drain={:.1}µs \
             commit={:.1}µs tasks={} commits={} rejected={}",
            s.slice_index,
            self.micros(s.elapsed.ticks()),
            self.micros(s.budget.ticks()),
            self.micros(s.drain_ticks),
            self.micros(s.commit_ticks),
            s.tasks_run,
            s.commits,
            s.rejected,
        );
    }

    fn on_task_start(&mut self, e: &TaskStartEvent) {
        let _ = writeln!(
            self.writer,
            "[task] slice={} {:?} lane={} gen={}",
            e.slice_index, e.task, e.lane, e.generation.0,
        );
    }

    fn on_task_step(&mut self, e: &TaskStepEvent) {
        let _ = writeln!(
            self.writer,
            "[task:step] slice={} {:?} {:?}",
            e.slice_index, e.task, e.step,
        );
    }
}
