// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;

use ripple_core::commit::RejectReason;
use ripple_core::lane::Lane;
use ripple_core::scheduler::SliceReport;
use ripple_core::trace::{
    BudgetChangeEvent, CommitEvent, DiscardEvent, DiscardReason, FaultEvent, SliceBeginEvent,
    StarvationBoostEvent, SuspenseEvent, SuspenseEventKind, TraceSink,
};

/// A [`TraceSink`] that counts scheduler events.
#[derive(Clone, Debug, Default)]
pub struct StatsSink {
    /// Slices started.
    pub slices: u64,
    /// Batches applied, per lane.
    pub commits: [u64; Lane::COUNT],
    /// Rejections for a newer generation.
    pub rejected_stale: u64,
    /// Rejections for a root no longer in flight.
    pub rejected_superseded: u64,
    /// Rejections for an unresolved subtree.
    pub rejected_unresolved: u64,
    /// Stale tasks dropped at pop time.
    pub discarded_stale: u64,
    /// Superseded tasks dropped at pop time.
    pub discarded_superseded: u64,
    /// Suspensions registered.
    pub suspended: u64,
    /// Suspended tasks re-admitted.
    pub readmitted: u64,
    /// Resolutions that found no current task.
    pub dropped: u64,
    /// Handles aborted or retired.
    pub aborted: u64,
    /// Faults reported.
    pub faults: u64,
    /// Anti-starvation boosts, indexed by the lane that was served.
    pub boosts: [u64; Lane::COUNT],
    /// Budget adjustments.
    pub budget_changes: u64,
}

impl StatsSink {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches applied across all lanes.
    #[must_use]
    pub fn total_commits(&self) -> u64 {
        self.commits.iter().sum()
    }

    /// Rejections of any kind.
    #[must_use]
    pub fn total_rejected(&self) -> u64 {
        self.rejected_stale + self.rejected_superseded + self.rejected_unresolved
    }
}

impl TraceSink for StatsSink {
    fn on_slice_begin(&mut self, _: &SliceBeginEvent) {
        self.slices += 1;
    }

    fn on_discard(&mut self, e: &DiscardEvent) {
        match e.reason {
            DiscardReason::StaleGeneration => self.discarded_stale += 1,
            DiscardReason::Superseded => self.discarded_superseded += 1,
        }
    }

    fn on_suspense(&mut self, e: &SuspenseEvent) {
        match e.kind {
            SuspenseEventKind::Registered => self.suspended += 1,
            SuspenseEventKind::Readmitted => self.readmitted += 1,
            SuspenseEventKind::Dropped => self.dropped += 1,
            SuspenseEventKind::Aborted => self.aborted += 1,
        }
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        match e.rejected() {
            None => self.commits[e.lane.index()] += 1,
            Some(RejectReason::StaleGeneration) => self.rejected_stale += 1,
            Some(RejectReason::Superseded) => self.rejected_superseded += 1,
            Some(RejectReason::Unresolved) => self.rejected_unresolved += 1,
        }
    }

    fn on_fault(&mut self, _: &FaultEvent) {
        self.faults += 1;
    }

    fn on_starvation_boost(&mut self, e: &StarvationBoostEvent) {
        self.boosts[e.to.index()] += 1;
    }

    fn on_budget_change(&mut self, _: &BudgetChangeEvent) {
        self.budget_changes += 1;
    }
}

/// Letter grade for slice pacing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceGrade {
    /// Slices stay within budget.
    A,
    /// Occasional modest overruns.
    B,
    /// Frequent or large overruns.
    C,
    /// The scheduler is not keeping to its budget.
    D,
}

impl SliceGrade {
    /// Returns a short label for HUD rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`SliceTracker::observe`].
#[derive(Clone, Copy, Debug)]
pub struct SliceHealth {
    /// Current grade.
    pub grade: SliceGrade,
    /// Overrunning slices per 1000 observed.
    pub overrun_rate_per_1000: f64,
    /// This slice's elapsed time as a fraction of its budget.
    pub utilization: f64,
    /// Worst elapsed/budget ratio in the history window.
    pub worst_utilization: f64,
    /// Total slices observed.
    pub total_slices: u64,
    /// Total overrunning slices observed.
    pub overrun_slices: u64,
}

/// Rolling slice tracker with a fixed-size utilization history.
#[derive(Debug)]
pub struct SliceTracker<const N: usize> {
    utilization: [f64; N],
    cursor: usize,
    total_slices: u64,
    overrun_slices: u64,
}

impl<const N: usize> Default for SliceTracker<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SliceTracker<N> {
    /// Creates an empty tracker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            utilization: [0.0; N],
            cursor: 0,
            total_slices: 0,
            overrun_slices: 0,
        }
    }

    /// Observes one slice and returns an updated report.
    #[must_use]
    pub fn observe(&mut self, report: &SliceReport) -> SliceHealth {
        self.total_slices = self.total_slices.saturating_add(1);
        let budget = report.budget.ticks().max(1);
        let utilization = report.elapsed.ticks() as f64 / budget as f64;
        self.utilization[self.cursor % N] = utilization;
        self.cursor = (self.cursor + 1) % N;

        if report.elapsed > report.budget {
            self.overrun_slices = self.overrun_slices.saturating_add(1);
        }

        let overrun_rate = self.overrun_slices as f64 * 1000.0 / self.total_slices as f64;
        let worst = self.utilization.iter().copied().fold(0.0, f64::max);

        SliceHealth {
            grade: grade_for(overrun_rate, worst),
            overrun_rate_per_1000: overrun_rate,
            utilization,
            worst_utilization: worst,
            total_slices: self.total_slices,
            overrun_slices: self.overrun_slices,
        }
    }

    /// Returns utilization history oldest→newest.
    #[must_use]
    pub fn history(&self) -> [f64; N] {
        let mut out = [0.0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.utilization[(self.cursor + i) % N];
        }
        out
    }

    /// Returns an ASCII sparkline over [`history`](Self::history), with full
    /// scale at `max_utilization`.
    #[must_use]
    pub fn sparkline_ascii(&self, max_utilization: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let mut out = String::with_capacity(N);
        for v in self.history() {
            let t = v.clamp(0.0, max_utilization) / max_utilization;
            #[expect(
                clippy::cast_possible_truncation,
                reason = "index is clamped to ASCII level count"
            )]
            let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
            out.push(LEVELS[level] as char);
        }
        out
    }
}

fn grade_for(overrun_rate_per_1000: f64, worst_utilization: f64) -> SliceGrade {
    if overrun_rate_per_1000 < 10.0 && worst_utilization <= 1.25 {
        SliceGrade::A
    } else if overrun_rate_per_1000 < 50.0 && worst_utilization <= 2.0 {
        SliceGrade::B
    } else if overrun_rate_per_1000 < 150.0 && worst_utilization <= 4.0 {
        SliceGrade::C
    } else {
        SliceGrade::D
    }
}
