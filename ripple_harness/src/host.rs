// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;

use ripple_core::commit::CommitBatch;
use ripple_core::host::{Clock, CommitSink, ErrorBoundary, FaultReport, SliceHost};
use ripple_core::lane::Lane;
use ripple_core::scheduler::{Scheduler, SliceOutcome, SliceReport};
use ripple_core::task::{Generation, RootKey, TaskId};
use ripple_core::time::{Duration, HostTime};
use ripple_core::trace::{TraceSink, Tracer};

/// A clock that advances only when told to.
///
/// Clones share the same time, so scripted work can spend time on the clock
/// the scheduler reads.
#[derive(Clone, Debug, Default)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    /// Creates a clock at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, ticks: u64) {
        self.0.set(self.0.get().saturating_add(ticks));
    }

    /// Jumps the clock to `t`.
    pub fn set(&self, t: HostTime) {
        self.0.set(t.ticks());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HostTime {
        HostTime(self.0.get())
    }
}

/// A batch as the sink saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedBatch<O> {
    /// Render root.
    pub root: RootKey,
    /// Root task of the batch.
    pub task: TaskId,
    /// Generation the batch was rendered for.
    pub generation: Generation,
    /// Lane the batch was ordered by.
    pub lane: Lane,
    /// Outputs in render order.
    pub outputs: Vec<O>,
}

/// A [`CommitSink`] that keeps a copy of every batch.
#[derive(Debug)]
pub struct RecordingSink<O> {
    batches: Vec<AppliedBatch<O>>,
}

impl<O> Default for RecordingSink<O> {
    fn default() -> Self {
        Self {
            batches: Vec::new(),
        }
    }
}

impl<O> RecordingSink<O> {
    /// All batches in the order they were applied.
    #[must_use]
    pub fn batches(&self) -> &[AppliedBatch<O>] {
        &self.batches
    }

    /// Batches applied for one root.
    pub fn for_root(&self, root: RootKey) -> impl Iterator<Item = &AppliedBatch<O>> {
        self.batches.iter().filter(move |b| b.root == root)
    }

    /// Roots in the order their batches were applied.
    #[must_use]
    pub fn roots(&self) -> Vec<RootKey> {
        self.batches.iter().map(|b| b.root).collect()
    }
}

impl<O: Clone> CommitSink<O> for RecordingSink<O> {
    fn apply(&mut self, batch: &CommitBatch<O>) {
        self.batches.push(AppliedBatch {
            root: batch.root(),
            task: batch.task(),
            generation: batch.generation(),
            lane: batch.lane(),
            outputs: batch.outputs().cloned().collect(),
        });
    }
}

/// An [`ErrorBoundary`] that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingBoundary {
    reports: Vec<FaultReport>,
}

impl RecordingBoundary {
    /// All reports in delivery order.
    #[must_use]
    pub fn reports(&self) -> &[FaultReport] {
        &self.reports
    }

    /// Number of reports naming `task`.
    #[must_use]
    pub fn count_for(&self, task: TaskId) -> usize {
        self.reports.iter().filter(|r| r.task == task).count()
    }
}

impl ErrorBoundary for RecordingBoundary {
    fn on_fault(&mut self, report: &FaultReport) {
        self.reports.push(report.clone());
    }
}

/// A deterministic host: manual clock, recording sink and recording
/// boundary.
#[derive(Debug)]
pub struct TestHost<O> {
    /// The clock handed to the scheduler.
    pub clock: ManualClock,
    /// Receives batches.
    pub sink: RecordingSink<O>,
    /// Receives faults.
    pub boundary: RecordingBoundary,
}

impl<O> Default for TestHost<O> {
    fn default() -> Self {
        Self {
            clock: ManualClock::new(),
            sink: RecordingSink::default(),
            boundary: RecordingBoundary::default(),
        }
    }
}

impl<O: Clone> TestHost<O> {
    /// Creates a host at tick zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one slice.
    pub fn run_slice(&mut self, sched: &mut Scheduler<O>) -> SliceReport {
        let mut host = SliceHost::new(&self.clock, &mut self.sink, &mut self.boundary);
        sched.run_slice(&mut host)
    }

    /// Runs one slice, reporting events to `trace`.
    pub fn run_slice_traced(
        &mut self,
        sched: &mut Scheduler<O>,
        trace: &mut dyn TraceSink,
    ) -> SliceReport {
        let mut host = SliceHost::new(&self.clock, &mut self.sink, &mut self.boundary)
            .with_tracer(Tracer::new(trace));
        sched.run_slice(&mut host)
    }

    /// Runs slices until one ends idle or `max_slices` have run, advancing
    /// the clock by `gap` between slices. Returns the reports.
    pub fn run_until_idle(
        &mut self,
        sched: &mut Scheduler<O>,
        max_slices: usize,
        gap: Duration,
    ) -> Vec<SliceReport> {
        let mut reports = Vec::new();
        for _ in 0..max_slices {
            let report = self.run_slice(sched);
            reports.push(report);
            if report.outcome == SliceOutcome::Idle {
                break;
            }
            self.clock.advance(gap.ticks());
        }
        reports
    }

    /// Aborts tasks suspended for at least `max_wait`.
    pub fn expire_suspended(&mut self, sched: &mut Scheduler<O>, max_wait: Duration) -> usize {
        let mut host = SliceHost::new(&self.clock, &mut self.sink, &mut self.boundary);
        sched.expire_suspended(&mut host, max_wait)
    }
}
