// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end scenarios driving a scheduler through the harness host.

use ripple_core::error::{Fault, WorkFault};
use ripple_core::lane::Lane;
use ripple_core::scheduler::{
    BudgetPolicy, ResolveOutcome, Scheduler, SchedulerConfig, SliceOutcome,
};
use ripple_core::task::{Generation, RootKey, TaskStatus};
use ripple_core::time::Duration;
use ripple_harness::{Action, ExecLog, HandleSlot, Script, StatsSink, TestHost};

fn fixed(budget: u64) -> SchedulerConfig {
    SchedulerConfig {
        slice_budget: Duration(budget),
        min_budget: Duration(1),
        max_budget: Duration(1_000),
        overrun_tolerance: Duration::ZERO,
        budget_policy: BudgetPolicy::Fixed,
        ..SchedulerConfig::interactive()
    }
}

#[test]
fn urgent_root_commits_while_other_waits_on_suspense() {
    let mut host = TestHost::<&str>::new();
    let mut sched = Scheduler::new(fixed(100));
    let slot = HandleSlot::new();

    let a = sched.admit_root(
        RootKey(1),
        Script::new().suspend_new(&slot).finish("a"),
        Lane::Normal,
    );
    host.run_slice(&mut sched);
    assert_eq!(sched.status(a), Some(TaskStatus::Suspended));

    sched.admit_root(RootKey(2), Script::done("b"), Lane::Immediate);
    host.run_slice(&mut sched);
    assert_eq!(host.sink.roots(), [RootKey(2)], "B commits before H resolves");

    let h = slot.get().expect("A created its handle");
    assert_eq!(sched.on_resolve(h), Ok(ResolveOutcome::Readmitted(1)));
    assert_eq!(sched.queue().lane_of(a), Some(Lane::Normal));

    host.run_until_idle(&mut sched, 10, Duration(0));
    let a_batches: Vec<_> = host.sink.for_root(RootKey(1)).collect();
    assert_eq!(a_batches.len(), 1);
    assert_eq!(a_batches[0].generation, Generation::FIRST, "generation unchanged");
    assert_eq!(a_batches[0].outputs, ["a"]);
}

#[test]
fn superseded_transition_commits_only_newest_result() {
    let mut host = TestHost::<&str>::new();
    let mut sched = Scheduler::new(fixed(5));
    let root = RootKey(7);

    // The first render makes partial progress before it is superseded.
    let first = Script::new()
        .on_clock(&host.clock)
        .spend(5)
        .cont()
        .spend(5)
        .finish("t1");
    sched.start_transition(root, first);
    let report = host.run_slice(&mut sched);
    assert_eq!(report.outcome, SliceOutcome::YieldedToHost);
    assert!(sched.is_pending(root));

    sched.start_transition(root, Script::done("t2"));
    host.run_until_idle(&mut sched, 10, Duration(0));

    let batches: Vec<_> = host.sink.for_root(root).collect();
    assert_eq!(batches.len(), 1, "exactly one batch for the root");
    assert_eq!(batches[0].generation, Generation(2));
    assert_eq!(batches[0].outputs, ["t2"]);
    assert!(!sched.is_pending(root));
}

#[test]
fn supersede_in_transition_lane_keeps_transition_alive() {
    let mut host = TestHost::<&str>::new();
    let mut sched = Scheduler::new(fixed(100));
    let root = RootKey(3);

    let t = sched.start_transition(root, Script::new().cont().finish("old"));
    let task = sched.supersede(root, Script::done("new")).unwrap();
    assert_eq!(sched.tree().lane(task), Some(Lane::Transition));
    assert_eq!(sched.transition_of(root), Some(t));
    assert!(sched.is_pending(root));

    host.run_until_idle(&mut sched, 10, Duration(0));
    assert_eq!(host.sink.batches().len(), 1);
    assert_eq!(host.sink.batches()[0].outputs, ["new"]);
    assert_eq!(sched.transition_of(root), None);
}

#[test]
fn fault_on_second_checkpoint_is_reported_once() {
    let mut host = TestHost::<u32>::new();
    let mut sched = Scheduler::new(fixed(100));

    let task = sched.admit_root(
        RootKey(1),
        Script::new().cont().fail("second checkpoint"),
        Lane::Normal,
    );
    host.run_until_idle(&mut sched, 10, Duration(0));

    assert_eq!(sched.status(task), Some(TaskStatus::Aborted));
    assert!(host.sink.batches().is_empty());
    assert_eq!(host.boundary.reports().len(), 1);
    assert_eq!(host.boundary.count_for(task), 1);
    assert_eq!(
        host.boundary.reports()[0].fault,
        Fault::WorkClosure(WorkFault::new("second checkpoint"))
    );
}

#[test]
fn faulted_root_recovers_after_supersede() {
    let mut host = TestHost::<u32>::new();
    let mut sched = Scheduler::new(fixed(100));
    let root = RootKey(4);

    let top = sched.admit_root(root, Script::done(1), Lane::Normal);
    sched.set_error_boundary(top, true).unwrap();
    sched
        .admit(top, Script::new().fail("child broke"), Lane::Normal)
        .unwrap();
    host.run_until_idle(&mut sched, 10, Duration(0));
    assert_eq!(host.boundary.reports()[0].boundary, Some(top));
    assert!(host.sink.batches().is_empty());

    sched.supersede(root, Script::done(2)).unwrap();
    host.run_until_idle(&mut sched, 10, Duration(0));
    assert_eq!(host.sink.batches().len(), 1);
    assert_eq!(host.sink.batches()[0].outputs, [2]);
    assert_eq!(host.sink.batches()[0].generation, Generation(2));
}

#[test]
fn resolving_twice_matches_resolving_once() {
    fn run(resolves: usize) -> (Vec<(RootKey, Generation, Vec<u32>)>, usize) {
        let mut host = TestHost::<u32>::new();
        let mut sched = Scheduler::new(fixed(100));
        let slot = HandleSlot::new();
        let top = sched.admit_root(RootKey(1), Script::done(1), Lane::Normal);
        sched
            .admit(top, Script::new().suspend_new(&slot).finish(2), Lane::Idle)
            .unwrap();
        host.run_slice(&mut sched);

        let h = slot.get().unwrap();
        for _ in 0..resolves {
            sched.on_resolve(h).unwrap();
        }
        host.run_until_idle(&mut sched, 10, Duration(0));
        let batches = host
            .sink
            .batches()
            .iter()
            .map(|b| (b.root, b.generation, b.outputs.clone()))
            .collect();
        let leftover = sched.queue().len() + sched.suspended_count() + sched.pending_commits();
        (batches, leftover)
    }

    let once = run(1);
    let twice = run(2);
    assert_eq!(once, twice);
    assert_eq!(once.0, [(RootKey(1), Generation(1), vec![1, 2])]);
    assert_eq!(once.1, 0);
}

#[test]
fn idle_progresses_under_continuous_immediate_admission() {
    let mut host = TestHost::<u64>::new();
    let mut sched = Scheduler::new(fixed(2));
    let log = ExecLog::new();

    sched.admit_root(
        RootKey(0),
        Script::done(0).logged(&log, 0),
        Lane::Idle,
    );
    let mut next = 1;
    for _ in 0..6 {
        // Two fresh urgent roots per slice keep the Immediate lane busy.
        for _ in 0..2 {
            let work = Script::new()
                .on_clock(&host.clock)
                .spend(1)
                .finish(next)
                .logged(&log, next);
            sched.admit_root(RootKey(next), work, Lane::Immediate);
            next += 1;
        }
        host.run_slice(&mut sched);
    }

    let limit = SchedulerConfig::DEFAULT_STARVATION_LIMIT as usize;
    assert_eq!(
        log.position(0),
        Some(limit),
        "idle runs right after {limit} immediate drains: {:?}",
        log.entries()
    );
}

#[test]
fn starvation_boosts_are_traced() {
    let mut host = TestHost::<u64>::new();
    let mut sched = Scheduler::new(fixed(100));
    let mut stats = StatsSink::new();

    sched.admit_root(RootKey(0), Script::done(0), Lane::Idle);
    for r in 1..=10 {
        sched.admit_root(RootKey(r), Script::done(r), Lane::Immediate);
    }
    host.run_slice_traced(&mut sched, &mut stats);

    assert_eq!(stats.slices, 1);
    assert_eq!(stats.boosts[Lane::Idle.index()], 1);
    assert_eq!(stats.commits[Lane::Immediate.index()], 10);
    assert_eq!(stats.commits[Lane::Idle.index()], 1);
    assert_eq!(stats.total_rejected(), 0);
}

#[test]
fn subtree_waits_for_suspended_child_then_commits_whole() {
    let mut host = TestHost::<&str>::new();
    let mut sched = Scheduler::new(fixed(100));
    let slot = HandleSlot::new();
    let mut stats = StatsSink::new();

    let top = sched.admit_root(RootKey(1), Script::done("top"), Lane::UserBlocking);
    sched
        .admit(top, Script::done("left"), Lane::UserBlocking)
        .unwrap();
    sched
        .admit(
            top,
            Script::new().suspend_new(&slot).finish("right"),
            Lane::Normal,
        )
        .unwrap();
    host.run_slice_traced(&mut sched, &mut stats);
    assert!(host.sink.batches().is_empty(), "partial subtree never commits");
    assert_eq!(stats.suspended, 1);

    sched.on_resolve(slot.get().unwrap()).unwrap();
    host.run_slice_traced(&mut sched, &mut stats);
    assert_eq!(stats.readmitted, 1, "reported at the next slice");
    let batch = &host.sink.batches()[0];
    assert_eq!(batch.outputs, ["top", "left", "right"]);
    assert_eq!(batch.lane, Lane::UserBlocking);
}

#[test]
fn unmount_while_suspended_drops_everything() {
    let mut host = TestHost::<u32>::new();
    let mut sched = Scheduler::new(fixed(100));
    let slot = HandleSlot::new();

    sched.admit_root(
        RootKey(1),
        Script::new().suspend_new(&slot).finish(1),
        Lane::Normal,
    );
    host.run_slice(&mut sched);
    sched.unmount(RootKey(1)).unwrap();

    assert_eq!(
        sched.on_resolve(slot.get().unwrap()),
        Ok(ResolveOutcome::ResolvedEarly),
        "nothing waits on the handle any more"
    );
    host.run_until_idle(&mut sched, 10, Duration(0));
    assert!(host.sink.batches().is_empty());
    assert_eq!(sched.tree().live_count(), 0);
}

#[test]
fn long_suspension_times_out_to_boundary() {
    let mut host = TestHost::<u32>::new();
    let mut sched = Scheduler::new(fixed(100));
    let slot = HandleSlot::new();

    let task = sched.admit_root(
        RootKey(1),
        Script::new().suspend_new(&slot).finish(1),
        Lane::Normal,
    );
    host.run_slice(&mut sched);
    host.clock.advance(1_000);
    assert_eq!(host.expire_suspended(&mut sched, Duration(500)), 1);

    assert_eq!(sched.status(task), Some(TaskStatus::Aborted));
    let report = &host.boundary.reports()[0];
    assert_eq!(report.task, task);
    assert!(matches!(
        report.fault,
        Fault::SuspensionTimeout { handle, .. } if Some(handle) == slot.get()
    ));
    assert_eq!(
        sched.on_resolve(slot.get().unwrap()),
        Ok(ResolveOutcome::ResolvedEarly),
        "timed-out task no longer waits"
    );
}

#[test]
fn reprioritized_task_jumps_the_queue() {
    let mut host = TestHost::<u32>::new();
    let mut sched = Scheduler::new(fixed(100));

    let slow = sched.admit_root(RootKey(1), Script::done(1), Lane::Idle);
    sched.admit_root(RootKey(2), Script::done(2), Lane::Normal);
    sched.reprioritize(slow, Lane::Immediate).unwrap();

    host.run_slice(&mut sched);
    assert_eq!(host.sink.roots(), [RootKey(1), RootKey(2)]);
}

#[test]
fn superseding_render_waits_on_the_same_fetch() {
    let mut host = TestHost::<&str>::new();
    let mut sched = Scheduler::new(fixed(100));
    let root = RootKey(1);
    let fetch = sched.create_handle();

    let old = sched.admit_root(
        root,
        Script::new().then(Action::Suspend(fetch)).finish("old"),
        Lane::Normal,
    );
    host.run_slice(&mut sched);
    assert_eq!(sched.status(old), Some(TaskStatus::Suspended));

    let new = sched
        .supersede(root, Script::new().then(Action::Suspend(fetch)).finish("new"))
        .unwrap();
    host.run_slice(&mut sched);
    assert_eq!(sched.status(new), Some(TaskStatus::Suspended));
    assert!(host.sink.batches().is_empty(), "fetch still in flight");

    assert_eq!(sched.on_resolve(fetch), Ok(ResolveOutcome::Readmitted(1)));
    host.run_until_idle(&mut sched, 10, Duration(0));
    let batches: Vec<_> = host.sink.for_root(root).collect();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].outputs, ["new"]);
    assert_eq!(batches[0].generation, Generation(2));
    assert_eq!(sched.on_resolve(fetch), Ok(ResolveOutcome::Duplicate));
}

#[test]
fn cancelled_fetch_faults_instead_of_committing() {
    let mut host = TestHost::<&str>::new();
    let mut sched = Scheduler::new(fixed(100));
    let fetch = sched.create_handle();
    assert!(sched.on_abort(fetch));

    let task = sched.admit_root(
        RootKey(1),
        Script::new().then(Action::Suspend(fetch)).finish("ran"),
        Lane::Normal,
    );
    host.run_until_idle(&mut sched, 10, Duration(0));

    assert_eq!(sched.status(task), Some(TaskStatus::Aborted));
    assert!(host.sink.batches().is_empty());
    assert_eq!(host.boundary.count_for(task), 1);
    assert!(matches!(
        host.boundary.reports()[0].fault,
        Fault::WorkClosure(_)
    ));
}
