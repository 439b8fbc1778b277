// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-sliced cooperative scheduling with priority lanes.
//!
//! The [`Scheduler`] owns the task tree, the lane queue, the suspense
//! tracker, the transition table, and the commit coordinator. The host grants
//! it time in slices through [`Scheduler::run_slice`]; everything else is
//! bookkeeping calls made between slices. See the [`Scheduler`] struct docs
//! for the slice algorithm, anti-starvation, and adaptive budget behavior.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::commit::{CommitCoordinator, CommitOutcome, ReadyRoot};
use crate::error::{Fault, SchedError, WorkFault, invariant};
use crate::host::{FaultReport, SliceHost};
use crate::lane::Lane;
use crate::queue::LaneQueue;
use crate::suspense::{Registration, Resolution, SuspenseHandle, SuspenseTracker, Waiter};
use crate::task::{AbortedTask, Children, RootKey, TaskId, TaskStatus, TaskTree};
use crate::time::{Duration, HostTime};
use crate::trace::{
    BudgetChangeEvent, CommitEvent, DiscardEvent, DiscardReason, FaultEvent, FaultKind,
    PhaseBeginEvent, PhaseEndEvent, PhaseKind, SliceBeginEvent, SliceEndEvent,
    SliceSummaryBuilder, StarvationBoostEvent, SuspenseEvent, SuspenseEventKind, Tracer,
};
use crate::transition::{TransitionId, TransitionManager};
use crate::work::{Checkpoint, Step, Work};

/// Controls how the scheduler adapts the slice budget to observed slice
/// lengths.
///
/// Passed to the [`Scheduler`] via [`SchedulerConfig::budget_policy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BudgetPolicy {
    /// Adapt the budget automatically.
    ///
    /// Shrinks the budget by `step` after `overrun_threshold` consecutive
    /// slices that overran it by more than
    /// [`SchedulerConfig::overrun_tolerance`]. Grows it by `step` after
    /// `recovery_threshold` consecutive slices that used their budget and
    /// yielded on time. Bounded by [`SchedulerConfig::min_budget`] and
    /// [`SchedulerConfig::max_budget`].
    Adaptive {
        /// Number of consecutive overruns before shrinking.
        overrun_threshold: u32,
        /// Number of consecutive on-time yields before growing.
        recovery_threshold: u32,
        /// Amount added or removed per adjustment.
        step: Duration,
    },
    /// Keep the budget fixed at [`SchedulerConfig::slice_budget`].
    ///
    /// The elapsed-time EMA is still tracked.
    Fixed,
}

/// Configuration for the [`Scheduler`].
///
/// The presets assume nanosecond ticks.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Initial time budget per slice.
    pub slice_budget: Duration,
    /// Smallest budget adaptive tuning may choose.
    pub min_budget: Duration,
    /// Largest budget adaptive tuning may choose.
    pub max_budget: Duration,
    /// How far past its budget a slice may run before it counts as an
    /// overrun.
    pub overrun_tolerance: Duration,
    /// Consecutive drains of a lane, while a lower lane waits, before one
    /// lower-lane task is served out of order. Zero disables the rule.
    pub starvation_limit: u32,
    /// EMA smoothing factor for slice elapsed time (0.0–1.0).
    /// Smaller values = more smoothing.
    pub ema_alpha: f32,
    /// Policy for adapting the slice budget.
    pub budget_policy: BudgetPolicy,
}

impl SchedulerConfig {
    /// Default anti-starvation limit.
    pub const DEFAULT_STARVATION_LIMIT: u32 = 4;

    /// Configuration for an interactive UI thread at 60 Hz.
    #[must_use]
    pub const fn interactive() -> Self {
        Self {
            // ~5ms leaves room for input handling and paint in a 16.7ms frame.
            slice_budget: Duration::from_millis(5),
            min_budget: Duration::from_millis(1),
            max_budget: Duration::from_millis(8),
            overrun_tolerance: Duration::from_millis(1),
            starvation_limit: Self::DEFAULT_STARVATION_LIMIT,
            ema_alpha: 0.2,
            budget_policy: BudgetPolicy::Adaptive {
                overrun_threshold: 3,
                recovery_threshold: 10,
                step: Duration::from_millis(1),
            },
        }
    }

    /// Configuration for a background render thread that is never
    /// latency-critical.
    #[must_use]
    pub const fn background() -> Self {
        Self {
            slice_budget: Duration::from_millis(50),
            min_budget: Duration::from_millis(50),
            max_budget: Duration::from_millis(50),
            overrun_tolerance: Duration::from_millis(10),
            starvation_limit: Self::DEFAULT_STARVATION_LIMIT,
            ema_alpha: 0.1,
            budget_policy: BudgetPolicy::Fixed,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Where the scheduler loop is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopState {
    /// Nothing queued when the last slice ended.
    Idle,
    /// Inside [`Scheduler::run_slice`].
    Draining,
    /// The last slice ran out of budget with work still queued.
    YieldedToHost,
}

/// Why a slice returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SliceOutcome {
    /// The queue drained.
    Idle,
    /// The budget ran out with work still queued; call `run_slice` again.
    YieldedToHost,
}

/// What happened during one slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceReport {
    /// Why the slice returned.
    pub outcome: SliceOutcome,
    /// Work steps run.
    pub tasks_run: u32,
    /// Popped tasks dropped as stale.
    pub discarded: u32,
    /// Batches handed to the sink.
    pub commits: u32,
    /// Ready roots rejected at commit time.
    pub rejected: u32,
    /// Time from slice start to return.
    pub elapsed: Duration,
    /// Budget the slice was granted.
    pub budget: Duration,
}

/// Result of [`Scheduler::on_resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// This many suspended tasks went back to their lanes.
    Readmitted(usize),
    /// Tasks were waiting but none is current any more.
    Dropped,
    /// Nobody was waiting yet; the next suspension on the handle re-admits at
    /// once.
    ResolvedEarly,
    /// The handle was already resolved or cancelled.
    Duplicate,
}

/// Exponential moving average tracker.
#[derive(Clone, Copy, Debug)]
struct Ema {
    value: f32,
    alpha: f32,
    initialized: bool,
}

impl Ema {
    const fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha,
            initialized: false,
        }
    }

    fn update(&mut self, sample: f32) {
        if self.initialized {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        } else {
            self.value = sample;
            self.initialized = true;
        }
    }

    const fn get(&self) -> f32 {
        self.value
    }
}

/// Lane chosen by [`Fairness::pick`].
#[derive(Clone, Copy, Debug)]
struct Pick {
    lane: Lane,
    boosted_from: Option<Lane>,
}

/// Per-lane drain streaks for the anti-starvation rule.
///
/// A lane's streak counts consecutive pops from it while some lower lane had
/// work. Once it reaches the limit, the turn passes to the next lower
/// non-empty lane, which may pass it on again if it is over its own limit.
#[derive(Clone, Copy, Debug)]
struct Fairness {
    streaks: [u32; Lane::COUNT],
    limit: u32,
}

impl Fairness {
    const fn new(limit: u32) -> Self {
        Self {
            streaks: [0; Lane::COUNT],
            limit,
        }
    }

    fn pick(&mut self, queue: &LaneQueue) -> Option<Pick> {
        let top = queue.highest_nonempty()?;
        // Lanes above the top are empty; their streaks are over.
        for streak in &mut self.streaks[..top.index()] {
            *streak = 0;
        }
        let mut lane = top;
        let mut boosted_from = None;
        while self.limit > 0 && self.streaks[lane.index()] >= self.limit {
            let Some(lower) = queue.next_nonempty_below(lane) else {
                break;
            };
            self.streaks[lane.index()] = 0;
            boosted_from.get_or_insert(lane);
            lane = lower;
        }
        Some(Pick { lane, boosted_from })
    }

    fn served(&mut self, lane: Lane, queue: &LaneQueue) {
        let streak = &mut self.streaks[lane.index()];
        if queue.next_nonempty_below(lane).is_some() {
            *streak += 1;
        } else {
            *streak = 0;
        }
    }
}

/// A suspense event observed outside a slice, reported at the next one.
#[derive(Clone, Copy, Debug)]
struct Deferred {
    handle: SuspenseHandle,
    task: Option<TaskId>,
    kind: SuspenseEventKind,
}

/// Cooperative render scheduler.
///
/// # Slices
///
/// [`run_slice`](Self::run_slice) drains the lane queue until it is empty or
/// the slice budget is spent (at least one step always runs). Each popped
/// task's [`Work`] is stepped once:
///
/// - [`Step::Done`] completes the task. When every task in its root's render
///   subtree has completed, the root is queued for commit.
/// - [`Step::Suspend`] parks the task until its handle resolves.
/// - [`Step::Continue`] puts the task back at the tail of its lane.
///
/// A step that returns an error aborts the task and its unfinished
/// descendants and reports a [`Fault`] to the host's error boundary. The slice
/// then carries on with the next task.
///
/// After draining, ready roots are validated and applied, most urgent lane
/// first.
///
/// # Anti-starvation
///
/// Lanes are served in strict priority order, except that after
/// [`SchedulerConfig::starvation_limit`] consecutive drains of a lane while a
/// lower lane has work, one task of the next lower non-empty lane is served.
/// The rule cascades, so every queued task runs within a bounded number of
/// pops.
///
/// # Adaptive budget
///
/// With [`BudgetPolicy::Adaptive`] the budget shrinks after consecutive
/// overrunning slices (a long step blew through it, so leave more headroom)
/// and grows back after consecutive slices that yielded on time.
///
/// # Generations
///
/// Every render request for a root gets a fresh generation. Superseding a
/// root aborts and releases the previous render's tasks immediately; a
/// ready root whose generation is no longer the newest is rejected at commit
/// time.
pub struct Scheduler<O> {
    config: SchedulerConfig,
    tree: TaskTree<O>,
    queue: LaneQueue,
    suspense: SuspenseTracker,
    transitions: TransitionManager,
    commits: CommitCoordinator,
    state: LoopState,
    active: Option<TaskId>,
    fairness: Fairness,
    budget: Duration,
    elapsed_ema: Ema,
    consecutive_overruns: u32,
    consecutive_on_time: u32,
    slice_index: u64,
    deferred: Vec<Deferred>,
}

impl<O> core::fmt::Debug for Scheduler<O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state)
            .field("budget", &self.budget)
            .field("queued", &self.queue.len())
            .field("tree", &self.tree)
            .field("slice_index", &self.slice_index)
            .finish_non_exhaustive()
    }
}

impl<O> Default for Scheduler<O> {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl<O> Scheduler<O> {
    /// Creates a new scheduler with the given configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            tree: TaskTree::new(),
            queue: LaneQueue::new(),
            suspense: SuspenseTracker::new(),
            transitions: TransitionManager::new(),
            commits: CommitCoordinator::new(),
            state: LoopState::Idle,
            active: None,
            fairness: Fairness::new(config.starvation_limit),
            budget: config
                .slice_budget
                .clamp_to(config.min_budget, config.max_budget),
            elapsed_ema: Ema::new(config.ema_alpha),
            consecutive_overruns: 0,
            consecutive_on_time: 0,
            slice_index: 0,
            deferred: Vec::new(),
            config,
        }
    }

    // -- Introspection --

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns the loop state after the last slice.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Returns the task currently running a work step.
    #[must_use]
    pub fn active(&self) -> Option<TaskId> {
        self.active
    }

    /// Returns the current slice budget.
    #[must_use]
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Returns the EMA-smoothed slice elapsed time in ticks.
    #[must_use]
    pub fn elapsed_ema_ticks(&self) -> u64 {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "EMA-smoothed slice time in ticks fits in u64"
        )]
        {
            self.elapsed_ema.get() as u64
        }
    }

    /// Returns the number of slices run so far.
    #[must_use]
    pub fn slices_run(&self) -> u64 {
        self.slice_index
    }

    /// Read access to the task tree.
    #[must_use]
    pub fn tree(&self) -> &TaskTree<O> {
        &self.tree
    }

    /// Read access to the lane queue.
    #[must_use]
    pub fn queue(&self) -> &LaneQueue {
        &self.queue
    }

    /// Returns the status of a task, or `None` if it was released.
    #[must_use]
    pub fn status(&self, task: TaskId) -> Option<TaskStatus> {
        self.tree.status(task)
    }

    /// Returns the children of a task in render order.
    pub fn children_of(&self, task: TaskId) -> Result<Children<'_, O>, SchedError> {
        self.tree.children(task).ok_or(SchedError::UnknownTask(task))
    }

    /// Returns the number of ready roots waiting for the commit phase.
    #[must_use]
    pub fn pending_commits(&self) -> usize {
        self.commits.pending()
    }

    /// Returns the number of tasks parked on suspense handles.
    #[must_use]
    pub fn suspended_count(&self) -> usize {
        self.suspense.waiting()
    }

    // -- Admission --

    /// Starts a render of `root` in `lane`.
    ///
    /// If the root already has a render in flight, that render is superseded:
    /// its tasks are aborted and released and the new task gets the next
    /// generation.
    pub fn admit_root(
        &mut self,
        root: RootKey,
        work: impl Work<O> + 'static,
        lane: Lane,
    ) -> TaskId {
        let task = self.begin_render(root, Box::new(work), lane);
        if lane == Lane::Transition {
            self.transitions.retarget(root, task);
        } else {
            self.transitions.clear(root);
        }
        task
    }

    /// Admits a child task under `parent`, inheriting its root and
    /// generation.
    pub fn admit(
        &mut self,
        parent: TaskId,
        work: impl Work<O> + 'static,
        lane: Lane,
    ) -> Result<TaskId, SchedError> {
        let status = self
            .tree
            .status(parent)
            .ok_or(SchedError::UnknownTask(parent))?;
        if status == TaskStatus::Aborted {
            return Err(SchedError::Aborted(parent));
        }
        let i = parent.idx as usize;
        let (root, generation) = (self.tree.root[i], self.tree.generation[i]);
        let task = self
            .tree
            .alloc(root, Some(parent), Box::new(work), lane, generation);
        self.queue.push(task, lane);
        Ok(task)
    }

    /// Replaces the in-flight render of `root` with new work in the same
    /// lane.
    pub fn supersede(
        &mut self,
        root: RootKey,
        work: impl Work<O> + 'static,
    ) -> Result<TaskId, SchedError> {
        let live = self
            .tree
            .live_task(root)
            .ok_or(SchedError::NoLiveTask(root))?;
        let lane = self.tree.lane[live.idx as usize];
        let task = self.begin_render(root, Box::new(work), lane);
        self.transitions.retarget(root, task);
        Ok(task)
    }

    /// Starts a transition render of `root`.
    ///
    /// The work runs in [`Lane::Transition`]. Any render in flight for the
    /// root, transition or not, is superseded.
    pub fn start_transition(
        &mut self,
        root: RootKey,
        work: impl Work<O> + 'static,
    ) -> TransitionId {
        let task = self.begin_render(root, Box::new(work), Lane::Transition);
        self.transitions.begin(root, task)
    }

    /// Returns whether the root's current transition still has tasks
    /// `Pending` or `Active`.
    #[must_use]
    pub fn is_pending(&self, root: RootKey) -> bool {
        self.transitions.is_pending(root, &self.tree)
    }

    /// Returns the root's in-flight transition.
    #[must_use]
    pub fn transition_of(&self, root: RootKey) -> Option<TransitionId> {
        self.transitions.transition_of(root)
    }

    /// Removes a root: its in-flight render is aborted and released and any
    /// ready batch for it will be rejected.
    pub fn unmount(&mut self, root: RootKey) -> Result<(), SchedError> {
        let record = self
            .tree
            .root_record(root)
            .ok_or(SchedError::NoLiveTask(root))?;
        if let Some(live) = record.live {
            self.retire(live);
        }
        self.tree.begin_render(root, record.lane);
        self.tree.set_live(root, None);
        self.transitions.clear(root);
        Ok(())
    }

    /// Moves a `Pending` task to the tail of another lane.
    pub fn reprioritize(&mut self, task: TaskId, lane: Lane) -> Result<(), SchedError> {
        let status = self
            .tree
            .status(task)
            .ok_or(SchedError::UnknownTask(task))?;
        if status != TaskStatus::Pending {
            return Err(SchedError::NotPending { task, status });
        }
        invariant!(
            self.queue.reprioritize(task, lane),
            "pending task missing from the lane queue"
        );
        self.tree.set_lane(task, lane);
        Ok(())
    }

    /// Registers or unregisters a task as an error boundary for its
    /// descendants.
    pub fn set_error_boundary(&mut self, task: TaskId, boundary: bool) -> Result<(), SchedError> {
        if !self.tree.is_alive(task) {
            return Err(SchedError::UnknownTask(task));
        }
        self.tree.set_boundary(task, boundary);
        Ok(())
    }

    // -- Suspense --

    /// Issues a suspense handle outside of a work step.
    pub fn create_handle(&mut self) -> SuspenseHandle {
        self.suspense.issue()
    }

    /// Resolves a suspense handle, re-admitting the tasks parked on it at
    /// their original lane if they are still current.
    ///
    /// Resolving the same handle again is a no-op.
    pub fn on_resolve(&mut self, handle: SuspenseHandle) -> Result<ResolveOutcome, SchedError> {
        match self.suspense.resolve(handle)? {
            Resolution::Wake(waiters) => {
                let mut readmitted = 0;
                for waiter in waiters {
                    let kind = if self.readmit(waiter) {
                        readmitted += 1;
                        SuspenseEventKind::Readmitted
                    } else {
                        SuspenseEventKind::Dropped
                    };
                    self.defer(handle, Some(waiter.task), kind);
                }
                Ok(if readmitted == 0 {
                    ResolveOutcome::Dropped
                } else {
                    ResolveOutcome::Readmitted(readmitted)
                })
            }
            Resolution::Early => Ok(ResolveOutcome::ResolvedEarly),
            Resolution::Duplicate => Ok(ResolveOutcome::Duplicate),
        }
    }

    /// Marks a handle's dependency cancelled. Parked tasks stay suspended;
    /// see [`expire_suspended`](Self::expire_suspended). Work that later
    /// suspends on the handle faults instead of parking.
    ///
    /// Returns whether the handle was still unsettled.
    pub fn on_abort(&mut self, handle: SuspenseHandle) -> bool {
        let removed = self.suspense.abort(handle);
        if removed {
            self.defer(handle, None, SuspenseEventKind::Aborted);
        }
        removed
    }

    /// Aborts every task suspended for at least `max_wait` and reports a
    /// [`Fault::SuspensionTimeout`] for each. Returns how many expired.
    pub fn expire_suspended(&mut self, host: &mut SliceHost<'_, O>, max_wait: Duration) -> usize {
        let now = host.clock.now();
        let mut expired = 0;
        for (task, handle, since) in self.tree.suspended() {
            // An earlier expiry may have aborted this task as a descendant.
            if self.tree.status(task) != Some(TaskStatus::Suspended) {
                continue;
            }
            let waited = now.saturating_duration_since(since);
            if waited >= max_wait {
                self.fail(task, Fault::SuspensionTimeout { handle, waited }, host, now);
                expired += 1;
            }
        }
        expired
    }

    // -- Slices --

    /// Runs one host-granted slice.
    pub fn run_slice(&mut self, host: &mut SliceHost<'_, O>) -> SliceReport {
        let start = host.clock.now();
        self.slice_index += 1;
        let slice = self.slice_index;
        let budget = self.budget;
        let deadline = start.saturating_add(budget);
        self.state = LoopState::Draining;

        host.tracer.slice_begin(&SliceBeginEvent {
            slice_index: slice,
            now: start,
            budget,
            queued: u32::try_from(self.queue.len()).unwrap_or(u32::MAX),
        });
        self.flush_deferred(&mut host.tracer, start);

        let mut summary = SliceSummaryBuilder::new(slice, start, budget);
        summary.phase_begin(PhaseKind::Drain, start);
        host.tracer.phase_begin(&PhaseBeginEvent {
            slice_index: slice,
            phase: PhaseKind::Drain,
            timestamp: start,
        });

        let mut tasks_run = 0_u32;
        let mut discarded = 0_u32;
        let outcome = loop {
            if self.queue.is_empty() {
                break SliceOutcome::Idle;
            }
            let now = host.clock.now();
            if tasks_run > 0 && now >= deadline {
                break SliceOutcome::YieldedToHost;
            }
            let Some((task, lane)) = self.next_task(&mut host.tracer, now) else {
                break SliceOutcome::Idle;
            };
            if let Some(reason) = self.discard_reason(task) {
                discarded += 1;
                host.tracer.discard(&DiscardEvent {
                    slice_index: slice,
                    task,
                    lane,
                    reason,
                    timestamp: now,
                });
                continue;
            }
            if self.run_task(task, deadline, host).is_err() {
                self.active = None;
            }
            tasks_run += 1;
        };

        let drain_end = host.clock.now();
        summary.phase_end(PhaseKind::Drain, drain_end);
        host.tracer.phase_end(&PhaseEndEvent {
            slice_index: slice,
            phase: PhaseKind::Drain,
            timestamp: drain_end,
        });
        summary.phase_begin(PhaseKind::Commit, drain_end);
        host.tracer.phase_begin(&PhaseBeginEvent {
            slice_index: slice,
            phase: PhaseKind::Commit,
            timestamp: drain_end,
        });

        let (commits, rejected) = self.flush_commits(host);

        let end = host.clock.now();
        summary.phase_end(PhaseKind::Commit, end);
        host.tracer.phase_end(&PhaseEndEvent {
            slice_index: slice,
            phase: PhaseKind::Commit,
            timestamp: end,
        });

        let elapsed = end.saturating_duration_since(start);
        if tasks_run > 0 {
            self.observe(elapsed, outcome, &mut host.tracer);
        }
        self.state = match outcome {
            SliceOutcome::Idle => LoopState::Idle,
            SliceOutcome::YieldedToHost => LoopState::YieldedToHost,
        };

        summary.set_counts(tasks_run, commits, rejected);
        host.tracer.slice_end(&SliceEndEvent {
            slice_index: slice,
            now: end,
            outcome,
            tasks_run,
        });
        host.tracer.slice_summary(&summary.finish(outcome, end));

        SliceReport {
            outcome,
            tasks_run,
            discarded,
            commits,
            rejected,
            elapsed,
            budget,
        }
    }

    // -- Internals --

    /// Supersedes whatever is in flight for `root` and queues a new render.
    fn begin_render(&mut self, root: RootKey, work: Box<dyn Work<O>>, lane: Lane) -> TaskId {
        if let Some(live) = self.tree.live_task(root) {
            self.retire(live);
        }
        let generation = self.tree.begin_render(root, lane);
        let task = self.tree.alloc(root, None, work, lane, generation);
        self.tree.set_live(root, Some(task));
        self.queue.push(task, lane);
        task
    }

    /// Aborts and releases a render subtree.
    fn retire(&mut self, top: TaskId) {
        let aborted = self.tree.abort_subtree(top);
        self.forget_aborted(&aborted);
        self.tree.release_subtree(top);
    }

    fn forget_aborted(&mut self, aborted: &[AbortedTask]) {
        for a in aborted {
            if a.was == TaskStatus::Pending {
                self.queue.remove(a.task);
            }
            if let Some(handle) = a.suspended_on {
                self.suspense.forget(handle, a.task);
                self.defer(handle, Some(a.task), SuspenseEventKind::Aborted);
            }
        }
    }

    fn readmit(&mut self, waiter: Waiter) -> bool {
        let current = self.tree.is_current(waiter.task)
            && self.tree.generation(waiter.task) == Some(waiter.generation)
            && self.tree.status(waiter.task) == Some(TaskStatus::Suspended);
        if !current || self.tree.resume(waiter.task).is_err() {
            return false;
        }
        self.queue.push(waiter.task, waiter.lane);
        true
    }

    fn defer(&mut self, handle: SuspenseHandle, task: Option<TaskId>, kind: SuspenseEventKind) {
        self.deferred.push(Deferred { handle, task, kind });
    }

    fn flush_deferred(&mut self, tracer: &mut Tracer<'_>, now: HostTime) {
        for d in self.deferred.drain(..) {
            tracer.suspense(&SuspenseEvent {
                slice_index: self.slice_index,
                handle: d.handle,
                task: d.task,
                kind: d.kind,
                timestamp: now,
            });
        }
    }

    fn next_task(&mut self, tracer: &mut Tracer<'_>, now: HostTime) -> Option<(TaskId, Lane)> {
        let pick = self.fairness.pick(&self.queue)?;
        let task = self.queue.pop_from(pick.lane)?;
        self.fairness.served(pick.lane, &self.queue);
        if let Some(from) = pick.boosted_from {
            tracer.starvation_boost(&StarvationBoostEvent {
                slice_index: self.slice_index,
                from,
                to: pick.lane,
                timestamp: now,
            });
        }
        Some((task, pick.lane))
    }

    fn discard_reason(&mut self, task: TaskId) -> Option<DiscardReason> {
        match self.tree.status(task) {
            Some(TaskStatus::Pending) if self.tree.is_current(task) => None,
            Some(TaskStatus::Pending) => {
                let aborted = self.tree.set_status(task, TaskStatus::Aborted);
                debug_assert!(aborted.is_ok(), "a pending task can always abort");
                Some(DiscardReason::StaleGeneration)
            }
            _ => Some(DiscardReason::Superseded),
        }
    }

    fn run_task(
        &mut self,
        task: TaskId,
        deadline: HostTime,
        host: &mut SliceHost<'_, O>,
    ) -> Result<(), SchedError> {
        invariant!(self.active.is_none(), "a task is already active");
        invariant!(
            self.tree.status(task) == Some(TaskStatus::Pending),
            "only pending tasks run"
        );
        let work = self.tree.take_work(task);
        invariant!(work.is_some(), "pending task has no work");
        let Some(mut work) = work else {
            return Err(SchedError::InvariantViolation("pending task has no work"));
        };
        self.tree.set_status(task, TaskStatus::Active)?;
        self.active = Some(task);

        let i = task.idx as usize;
        let (lane, generation) = (self.tree.lane[i], self.tree.generation[i]);

        #[cfg(feature = "trace-rich")]
        host.tracer.task_start(&crate::trace::TaskStartEvent {
            slice_index: self.slice_index,
            task,
            lane,
            generation,
            timestamp: host.clock.now(),
        });

        let result = {
            let mut cx = Checkpoint::new(host.clock, deadline, task, lane, &mut self.suspense);
            work.step(&mut cx)
        };
        self.active = None;
        let now = host.clock.now();

        #[cfg(feature = "trace-rich")]
        host.tracer.task_step(&crate::trace::TaskStepEvent {
            slice_index: self.slice_index,
            task,
            step: match &result {
                Ok(Step::Done(_)) => crate::trace::StepKind::Done,
                Ok(Step::Suspend(_)) => crate::trace::StepKind::Suspend,
                Ok(Step::Continue) => crate::trace::StepKind::Continue,
                Err(_) => crate::trace::StepKind::Fault,
            },
            timestamp: now,
        });

        match result {
            Ok(Step::Done(output)) => {
                self.tree.complete(task, output)?;
                self.note_completed(task);
            }
            Ok(Step::Continue) => {
                self.tree.restore_work(task, work);
                self.tree.set_status(task, TaskStatus::Pending)?;
                self.queue.push(task, lane);
            }
            Ok(Step::Suspend(handle)) => {
                let waiter = Waiter {
                    task,
                    lane,
                    generation,
                };
                match self.suspense.register(handle, waiter) {
                    Ok(Registration::Cancelled) => {
                        let fault = WorkFault::new("suspended on a cancelled dependency");
                        self.fail(task, Fault::WorkClosure(fault), host, now);
                    }
                    Ok(registration) => {
                        self.tree.restore_work(task, work);
                        self.tree.suspend(task, handle, now)?;
                        self.trace_suspense(host, handle, task, SuspenseEventKind::Registered, now);
                        if registration == Registration::AlreadyResolved {
                            self.tree.resume(task)?;
                            self.queue.push(task, lane);
                            self.trace_suspense(
                                host,
                                handle,
                                task,
                                SuspenseEventKind::Readmitted,
                                now,
                            );
                        }
                    }
                    Err(_) => {
                        let fault = WorkFault::new("suspended on a handle that was never issued");
                        self.fail(task, Fault::WorkClosure(fault), host, now);
                    }
                }
            }
            Err(fault) => self.fail(task, Fault::WorkClosure(fault), host, now),
        }
        Ok(())
    }

    fn trace_suspense(
        &self,
        host: &mut SliceHost<'_, O>,
        handle: SuspenseHandle,
        task: TaskId,
        kind: SuspenseEventKind,
        now: HostTime,
    ) {
        host.tracer.suspense(&SuspenseEvent {
            slice_index: self.slice_index,
            handle,
            task: Some(task),
            kind,
            timestamp: now,
        });
    }

    /// Queues the task's render root for commit once its subtree resolves.
    fn note_completed(&mut self, task: TaskId) {
        let Some(top) = self.tree.top_of(task) else {
            return;
        };
        let i = top.idx as usize;
        let root = self.tree.root[i];
        if self.tree.live_task(root) != Some(top) || !self.tree.is_resolved(top) {
            return;
        }
        self.commits.enqueue(ReadyRoot {
            root,
            task: top,
            generation: self.tree.generation[i],
            lane: self.tree.lane[i],
        });
    }

    /// Aborts a task's unfinished subtree and reports the fault.
    fn fail(&mut self, task: TaskId, fault: Fault, host: &mut SliceHost<'_, O>, now: HostTime) {
        let Some(root) = self.tree.root_of(task) else {
            return;
        };
        let boundary = self.tree.nearest_boundary(task);
        let aborted = self.tree.abort_subtree(task);
        self.forget_aborted(&aborted);

        host.tracer.fault(&FaultEvent {
            slice_index: self.slice_index,
            task,
            root,
            boundary,
            kind: FaultKind::from(&fault),
            timestamp: now,
        });
        host.boundary.on_fault(&FaultReport {
            task,
            root,
            boundary,
            fault,
        });
    }

    fn flush_commits(&mut self, host: &mut SliceHost<'_, O>) -> (u32, u32) {
        let (mut commits, mut rejected) = (0, 0);
        while let Some(ready) = self.commits.pop_next() {
            let (outcome, entries) = match self.commits.try_commit(&ready, &mut self.tree) {
                Ok(batch) => {
                    host.sink.apply(&batch);
                    self.tree.release_subtree(ready.task);
                    self.tree.set_live(ready.root, None);
                    self.transitions.clear_if(ready.root, ready.task);
                    commits += 1;
                    (
                        CommitOutcome::Committed,
                        u32::try_from(batch.len()).unwrap_or(u32::MAX),
                    )
                }
                Err(reason) => {
                    rejected += 1;
                    (CommitOutcome::Rejected(reason), 0)
                }
            };
            host.tracer.commit(&CommitEvent {
                slice_index: self.slice_index,
                root: ready.root,
                task: ready.task,
                generation: ready.generation,
                lane: ready.lane,
                outcome,
                entries,
                timestamp: host.clock.now(),
            });
        }
        (commits, rejected)
    }

    /// Feeds a finished slice into the budget policy.
    fn observe(&mut self, elapsed: Duration, outcome: SliceOutcome, tracer: &mut Tracer<'_>) {
        self.elapsed_ema.update(elapsed.ticks() as f32);

        let BudgetPolicy::Adaptive {
            overrun_threshold,
            recovery_threshold,
            step,
        } = self.config.budget_policy
        else {
            return;
        };
        let old = self.budget;
        let (min, max) = (self.config.min_budget, self.config.max_budget);
        let overran = elapsed > old.saturating_add(self.config.overrun_tolerance);

        if overran {
            self.consecutive_overruns += 1;
            self.consecutive_on_time = 0;
            if self.consecutive_overruns >= overrun_threshold && old > min {
                self.budget = old.saturating_sub(step).clamp_to(min, max);
                self.consecutive_overruns = 0;
            }
        } else if outcome == SliceOutcome::YieldedToHost {
            self.consecutive_on_time += 1;
            self.consecutive_overruns = 0;
            if self.consecutive_on_time >= recovery_threshold && old < max {
                self.budget = old.saturating_add(step).clamp_to(min, max);
                self.consecutive_on_time = 0;
            }
        } else {
            self.consecutive_overruns = 0;
            self.consecutive_on_time = 0;
        }

        if self.budget != old {
            tracer.budget_change(&BudgetChangeEvent {
                slice_index: self.slice_index,
                old,
                new: self.budget,
                elapsed_ema: self.elapsed_ema_ticks(),
            });
        }
    }
}
