// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the scheduler loop.
//!
//! The scheduler reports what happens inside a slice to a [`TraceSink`]:
//! slice and phase boundaries, discards, suspense traffic, commits, faults,
//! starvation boosts and budget changes. Every sink method has an empty
//! default body.
//!
//! The scheduler never holds a sink directly. It goes through [`Tracer`],
//! whose methods are empty unless the `trace` feature is enabled, so an
//! untraced build pays nothing for instrumentation.
//!
//! Phase timings are also folded into one [`SliceSummary`] per slice by
//! [`SliceSummaryBuilder`].
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates per-task [`TaskStartEvent`] and
//!   [`TaskStepEvent`] events plus the corresponding `TraceSink` methods.

use crate::commit::{CommitOutcome, RejectReason};
use crate::error::Fault;
use crate::lane::Lane;
use crate::scheduler::SliceOutcome;
use crate::suspense::SuspenseHandle;
use crate::task::{Generation, RootKey, TaskId};
use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a slice is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Popping and running tasks.
    Drain,
    /// Validating ready roots and handing batches to the sink.
    Commit,
}

impl PhaseKind {
    /// Short label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drain => "drain",
            Self::Commit => "commit",
        }
    }
}

/// Why a popped task was dropped without running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscardReason {
    /// The task's generation is older than its root's.
    StaleGeneration,
    /// The task was aborted or released after it was queued.
    Superseded,
}

impl DiscardReason {
    /// Short label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StaleGeneration => "stale-generation",
            Self::Superseded => "superseded",
        }
    }
}

/// What happened to a suspense handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SuspenseEventKind {
    /// A task suspended on the handle.
    Registered,
    /// The handle resolved and the task was re-admitted.
    Readmitted,
    /// The handle resolved but the task was no longer current.
    Dropped,
    /// The handle was aborted by its source or retired with its task.
    Aborted,
}

impl SuspenseEventKind {
    /// Short label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Readmitted => "readmitted",
            Self::Dropped => "dropped",
            Self::Aborted => "aborted",
        }
    }
}

/// Classification of a [`Fault`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The work closure returned an error.
    WorkClosure,
    /// The host timed out a suspended task.
    SuspensionTimeout,
}

impl From<&Fault> for FaultKind {
    fn from(fault: &Fault) -> Self {
        match fault {
            Fault::WorkClosure(_) => Self::WorkClosure,
            Fault::SuspensionTimeout { .. } => Self::SuspensionTimeout,
        }
    }
}

/// What a single work step returned.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// `Step::Done`.
    Done,
    /// `Step::Suspend`.
    Suspend,
    /// `Step::Continue`.
    Continue,
    /// The work returned an error.
    Fault,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a slice starts.
#[derive(Clone, Copy, Debug)]
pub struct SliceBeginEvent {
    /// Monotonic slice counter.
    pub slice_index: u64,
    /// Slice start time.
    pub now: HostTime,
    /// Time budget granted to the slice.
    pub budget: Duration,
    /// Tasks queued at slice start.
    pub queued: u32,
}

/// Emitted when a slice returns to the host.
#[derive(Clone, Copy, Debug)]
pub struct SliceEndEvent {
    /// Monotonic slice counter.
    pub slice_index: u64,
    /// Slice end time.
    pub now: HostTime,
    /// Why the slice ended.
    pub outcome: SliceOutcome,
    /// Work steps run during the slice.
    pub tasks_run: u32,
}

/// Emitted at the beginning of a slice phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Slice this phase belongs to.
    pub slice_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// When the phase started.
    pub timestamp: HostTime,
}

/// Emitted at the end of a slice phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Slice this phase belongs to.
    pub slice_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// When the phase ended.
    pub timestamp: HostTime,
}

/// Emitted when a popped task is dropped without running.
#[derive(Clone, Copy, Debug)]
pub struct DiscardEvent {
    /// Slice the discard happened in.
    pub slice_index: u64,
    /// The dropped task.
    pub task: TaskId,
    /// The lane it was popped from.
    pub lane: Lane,
    /// Why it was dropped.
    pub reason: DiscardReason,
    /// When it was dropped.
    pub timestamp: HostTime,
}

/// Emitted when a suspense handle changes state.
#[derive(Clone, Copy, Debug)]
pub struct SuspenseEvent {
    /// Slice the event was observed in.
    pub slice_index: u64,
    /// The handle.
    pub handle: SuspenseHandle,
    /// The task involved, if any.
    pub task: Option<TaskId>,
    /// What happened.
    pub kind: SuspenseEventKind,
    /// When the event was observed.
    pub timestamp: HostTime,
}

/// Emitted for every ready root the commit phase examines.
#[derive(Clone, Copy, Debug)]
pub struct CommitEvent {
    /// Slice the commit phase belongs to.
    pub slice_index: u64,
    /// The render root.
    pub root: RootKey,
    /// Root task of the subtree.
    pub task: TaskId,
    /// Generation the subtree was rendered for.
    pub generation: Generation,
    /// Lane the batch was ordered by.
    pub lane: Lane,
    /// Whether the batch was applied.
    pub outcome: CommitOutcome,
    /// Number of outputs applied (zero when rejected).
    pub entries: u32,
    /// When the decision was made.
    pub timestamp: HostTime,
}

impl CommitEvent {
    /// Returns the rejection reason, if the batch was rejected.
    #[must_use]
    pub fn rejected(&self) -> Option<RejectReason> {
        match self.outcome {
            CommitOutcome::Committed => None,
            CommitOutcome::Rejected(reason) => Some(reason),
        }
    }
}

/// Emitted when a fault is delivered to the error boundary.
#[derive(Clone, Copy, Debug)]
pub struct FaultEvent {
    /// Slice the fault happened in.
    pub slice_index: u64,
    /// The faulting task.
    pub task: TaskId,
    /// Its render root.
    pub root: RootKey,
    /// The nearest registered boundary.
    pub boundary: Option<TaskId>,
    /// Fault classification.
    pub kind: FaultKind,
    /// When the fault was observed.
    pub timestamp: HostTime,
}

/// Emitted when anti-starvation serves a lower lane out of order.
#[derive(Clone, Copy, Debug)]
pub struct StarvationBoostEvent {
    /// Slice the boost happened in.
    pub slice_index: u64,
    /// The lane whose streak hit the limit.
    pub from: Lane,
    /// The lane that was served instead.
    pub to: Lane,
    /// When the boost happened.
    pub timestamp: HostTime,
}

/// Emitted when adaptive budget tuning changes the slice budget.
#[derive(Clone, Copy, Debug)]
pub struct BudgetChangeEvent {
    /// Slice after which the change was made.
    pub slice_index: u64,
    /// Budget before the change.
    pub old: Duration,
    /// Budget after the change.
    pub new: Duration,
    /// Exponential moving average of slice elapsed time, in ticks.
    pub elapsed_ema: u64,
}

/// Per-slice timing summary.
#[derive(Clone, Copy, Debug)]
pub struct SliceSummary {
    /// Monotonic slice counter.
    pub slice_index: u64,
    /// Slice start time.
    pub start: HostTime,
    /// Granted budget.
    pub budget: Duration,
    /// Wall time the slice took.
    pub elapsed: Duration,
    /// Ticks spent draining the queue.
    pub drain_ticks: u64,
    /// Ticks spent in the commit phase.
    pub commit_ticks: u64,
    /// Work steps run.
    pub tasks_run: u32,
    /// Batches applied.
    pub commits: u32,
    /// Ready roots rejected.
    pub rejected: u32,
    /// Why the slice ended.
    pub outcome: SliceOutcome,
}

/// Emitted when a task starts a work step (requires `trace-rich`).
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct TaskStartEvent {
    /// Slice the step runs in.
    pub slice_index: u64,
    /// The task.
    pub task: TaskId,
    /// Its lane.
    pub lane: Lane,
    /// Its generation.
    pub generation: Generation,
    /// When the step started.
    pub timestamp: HostTime,
}

/// Emitted when a work step returns (requires `trace-rich`).
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct TaskStepEvent {
    /// Slice the step ran in.
    pub slice_index: u64,
    /// The task.
    pub task: TaskId,
    /// What the step returned.
    pub step: StepKind,
    /// When the step returned.
    pub timestamp: HostTime,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the scheduler.
///
/// Each method has an empty default body.
pub trait TraceSink {
    /// Called when a slice starts.
    fn on_slice_begin(&mut self, e: &SliceBeginEvent) {
        _ = e;
    }

    /// Called when a slice ends.
    fn on_slice_end(&mut self, e: &SliceEndEvent) {
        _ = e;
    }

    /// Called at the beginning of a slice phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a slice phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when a popped task is discarded.
    fn on_discard(&mut self, e: &DiscardEvent) {
        _ = e;
    }

    /// Called when a suspense handle changes state.
    fn on_suspense(&mut self, e: &SuspenseEvent) {
        _ = e;
    }

    /// Called for each commit decision.
    fn on_commit(&mut self, e: &CommitEvent) {
        _ = e;
    }

    /// Called when a fault is reported.
    fn on_fault(&mut self, e: &FaultEvent) {
        _ = e;
    }

    /// Called when a lower lane is served out of order.
    fn on_starvation_boost(&mut self, e: &StarvationBoostEvent) {
        _ = e;
    }

    /// Called when the slice budget changes.
    fn on_budget_change(&mut self, e: &BudgetChangeEvent) {
        _ = e;
    }

    /// Called with a per-slice timing summary.
    fn on_slice_summary(&mut self, s: &SliceSummary) {
        _ = s;
    }

    /// Called when a task step starts (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_task_start(&mut self, e: &TaskStartEvent) {
        _ = e;
    }

    /// Called when a task step returns (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_task_step(&mut self, e: &TaskStepEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A sink that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// The scheduler's handle on an optional [`TraceSink`].
///
/// Without the `trace` feature this is a zero-sized marker and every method
/// body is empty.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

/// Generates a `Tracer` method that forwards one event to the sink.
macro_rules! forward {
    ($(#[$doc:meta])* $name:ident => $hook:ident($ty:ty)) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: &$ty) {
            #[cfg(feature = "trace")]
            if let Some(s) = &mut self.sink {
                s.$hook(e);
            }
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    forward!(
        /// Emits a [`SliceBeginEvent`].
        slice_begin => on_slice_begin(SliceBeginEvent)
    );
    forward!(
        /// Emits a [`SliceEndEvent`].
        slice_end => on_slice_end(SliceEndEvent)
    );
    forward!(
        /// Emits a [`PhaseBeginEvent`].
        phase_begin => on_phase_begin(PhaseBeginEvent)
    );
    forward!(
        /// Emits a [`PhaseEndEvent`].
        phase_end => on_phase_end(PhaseEndEvent)
    );
    forward!(
        /// Emits a [`DiscardEvent`].
        discard => on_discard(DiscardEvent)
    );
    forward!(
        /// Emits a [`SuspenseEvent`].
        suspense => on_suspense(SuspenseEvent)
    );
    forward!(
        /// Emits a [`CommitEvent`].
        commit => on_commit(CommitEvent)
    );
    forward!(
        /// Emits a [`FaultEvent`].
        fault => on_fault(FaultEvent)
    );
    forward!(
        /// Emits a [`StarvationBoostEvent`].
        starvation_boost => on_starvation_boost(StarvationBoostEvent)
    );
    forward!(
        /// Emits a [`BudgetChangeEvent`].
        budget_change => on_budget_change(BudgetChangeEvent)
    );
    forward!(
        /// Emits a [`SliceSummary`].
        slice_summary => on_slice_summary(SliceSummary)
    );

    /// Emits a [`TaskStartEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn task_start(&mut self, e: &TaskStartEvent) {
        if let Some(s) = &mut self.sink {
            s.on_task_start(e);
        }
    }

    /// Emits a [`TaskStepEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn task_step(&mut self, e: &TaskStepEvent) {
        if let Some(s) = &mut self.sink {
            s.on_task_step(e);
        }
    }
}

// ---------------------------------------------------------------------------
// SliceSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a slice and produces a [`SliceSummary`].
#[derive(Debug)]
pub struct SliceSummaryBuilder {
    slice_index: u64,
    start: HostTime,
    budget: Duration,
    phase_starts: [Option<HostTime>; 2],
    phase_ends: [Option<HostTime>; 2],
    tasks_run: u32,
    commits: u32,
    rejected: u32,
}

impl SliceSummaryBuilder {
    /// Starts building a summary for a slice.
    #[must_use]
    pub fn new(slice_index: u64, start: HostTime, budget: Duration) -> Self {
        Self {
            slice_index,
            start,
            budget,
            phase_starts: [None; 2],
            phase_ends: [None; 2],
            tasks_run: 0,
            commits: 0,
            rejected: 0,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Records the slice's counters.
    pub fn set_counts(&mut self, tasks_run: u32, commits: u32, rejected: u32) {
        self.tasks_run = tasks_run;
        self.commits = commits;
        self.rejected = rejected;
    }

    /// Consumes the builder and produces the final [`SliceSummary`].
    #[must_use]
    pub fn finish(self, outcome: SliceOutcome, end: HostTime) -> SliceSummary {
        SliceSummary {
            slice_index: self.slice_index,
            start: self.start,
            budget: self.budget,
            elapsed: end.saturating_duration_since(self.start),
            drain_ticks: self.phase_duration(PhaseKind::Drain),
            commit_ticks: self.phase_duration(PhaseKind::Commit),
            tasks_run: self.tasks_run,
            commits: self.commits,
            rejected: self.rejected,
            outcome,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_duration_since(start).ticks(),
            _ => 0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Drain => 0,
        PhaseKind::Commit => 1,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
