// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Model-based properties over random admission, supersession, suspense and
//! slice sequences.
//!
//! A small shadow model tracks, per root, the newest render request and its
//! generation. After every slice the scheduler must agree with it: no task
//! is left active, every applied batch carries the newest request of its
//! root, and no generation is applied twice.

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use ripple_core::lane::Lane;
use ripple_core::scheduler::{BudgetPolicy, LoopState, Scheduler, SchedulerConfig, SliceOutcome};
use ripple_core::task::{Generation, RootKey, TaskStatus};
use ripple_core::time::Duration;
use ripple_harness::{ExecLog, HandleSlot, Script, TestHost};

const ROOTS: u64 = 3;

#[derive(Clone, Debug)]
enum Op {
    Admit { root: u64, lane: usize, conts: u8, cost: u64 },
    Transition { root: u64, conts: u8, cost: u64 },
    Supersede { root: u64, conts: u8, cost: u64 },
    Child { root: u64, lane: usize, suspend: bool },
    Resolve { slot: usize },
    Unmount { root: u64 },
    Slice,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => (0..ROOTS, 0..Lane::COUNT, 0..3_u8, 0..4_u64)
            .prop_map(|(root, lane, conts, cost)| Op::Admit { root, lane, conts, cost }),
        1 => (0..ROOTS, 0..3_u8, 0..4_u64)
            .prop_map(|(root, conts, cost)| Op::Transition { root, conts, cost }),
        1 => (0..ROOTS, 0..3_u8, 0..4_u64)
            .prop_map(|(root, conts, cost)| Op::Supersede { root, conts, cost }),
        2 => (0..ROOTS, 0..Lane::COUNT, any::<bool>())
            .prop_map(|(root, lane, suspend)| Op::Child { root, lane, suspend }),
        1 => (0..8_usize).prop_map(|slot| Op::Resolve { slot }),
        1 => (0..ROOTS).prop_map(|root| Op::Unmount { root }),
        3 => Just(Op::Slice),
    ]
}

fn lane(index: usize) -> Lane {
    Lane::from_index(index).unwrap_or(Lane::Normal)
}

/// Newest request per root and everything already applied.
#[derive(Default)]
struct Model {
    live: HashMap<u64, (Generation, u64)>,
    last_generation: HashMap<u64, Generation>,
    applied: HashSet<(u64, Generation)>,
    next_request: u64,
}

impl Model {
    fn request(&mut self) -> u64 {
        self.next_request += 1;
        self.next_request
    }

    fn admitted(&mut self, root: u64, generation: Generation, request: u64) {
        if let Some(prev) = self.last_generation.insert(root, generation) {
            assert!(generation > prev, "generations grow per root");
        }
        self.live.insert(root, (generation, request));
    }
}

struct Run {
    host: TestHost<u64>,
    sched: Scheduler<u64>,
    model: Model,
    slots: Vec<HandleSlot>,
    seen: usize,
}

impl Run {
    fn new() -> Self {
        let config = SchedulerConfig {
            slice_budget: Duration(6),
            min_budget: Duration(1),
            max_budget: Duration(64),
            budget_policy: BudgetPolicy::Fixed,
            ..SchedulerConfig::interactive()
        };
        Self {
            host: TestHost::new(),
            sched: Scheduler::new(config),
            model: Model::default(),
            slots: Vec::new(),
            seen: 0,
        }
    }

    fn script(&self, conts: u8, cost: u64, output: u64) -> Script<u64> {
        let mut script = Script::new().on_clock(&self.host.clock);
        for _ in 0..conts {
            script = script.spend(cost).cont();
        }
        script.spend(cost).finish(output)
    }

    fn generation_of(&self, root: u64) -> Generation {
        self.sched
            .tree()
            .root_generation(RootKey(root))
            .expect("admitted root has a record")
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Admit { root, lane: l, conts, cost } => {
                let request = self.model.request();
                let work = self.script(conts, cost, request);
                self.sched.admit_root(RootKey(root), work, lane(l));
                let generation = self.generation_of(root);
                self.model.admitted(root, generation, request);
            }
            Op::Transition { root, conts, cost } => {
                let request = self.model.request();
                let work = self.script(conts, cost, request);
                self.sched.start_transition(RootKey(root), work);
                assert!(self.sched.transition_of(RootKey(root)).is_some());
                let generation = self.generation_of(root);
                self.model.admitted(root, generation, request);
            }
            Op::Supersede { root, conts, cost } => {
                let request = self.model.request();
                let work = self.script(conts, cost, request);
                match self.sched.supersede(RootKey(root), work) {
                    Ok(_) => {
                        assert!(self.model.live.contains_key(&root));
                        let generation = self.generation_of(root);
                        self.model.admitted(root, generation, request);
                    }
                    Err(_) => assert!(!self.model.live.contains_key(&root)),
                }
            }
            Op::Child { root, lane: l, suspend } => {
                let live = self.sched.tree().live_task(RootKey(root));
                let Some(&(_, request)) = self.model.live.get(&root) else {
                    assert_eq!(live, None);
                    return;
                };
                let top = live.expect("model and scheduler agree on liveness");
                let mut work = Script::new();
                if suspend {
                    let slot = HandleSlot::new();
                    work = work.suspend_new(&slot);
                    self.slots.push(slot);
                }
                self.sched
                    .admit(top, work.finish(request), lane(l))
                    .expect("live render accepts children");
            }
            Op::Resolve { slot } => {
                if self.slots.is_empty() {
                    return;
                }
                let slot = &self.slots[slot % self.slots.len()];
                if let Some(handle) = slot.get() {
                    self.sched.on_resolve(handle).expect("issued handle");
                }
            }
            Op::Unmount { root } => {
                let known = self.model.last_generation.contains_key(&root);
                assert_eq!(self.sched.unmount(RootKey(root)).is_ok(), known);
                self.model.live.remove(&root);
            }
            Op::Slice => {
                self.host.run_slice(&mut self.sched);
                self.check();
            }
        }
    }

    /// Checks the post-slice state against the model.
    fn check(&mut self) {
        assert_eq!(self.sched.active(), None);
        assert_ne!(self.sched.state(), LoopState::Draining);
        assert_eq!(self.sched.tree().count_status(TaskStatus::Active), 0);

        let fresh = &self.host.sink.batches()[self.seen..];
        for pair in fresh.windows(2) {
            assert!(pair[0].lane <= pair[1].lane, "urgent lanes commit first");
        }
        for batch in fresh {
            let root = batch.root.0;
            let (generation, request) = self
                .model
                .live
                .remove(&root)
                .expect("applied batch belongs to a live render");
            assert_eq!(batch.generation, generation);
            assert!(batch.outputs.iter().all(|&o| o == request));
            assert!(
                self.model.applied.insert((root, generation)),
                "generation applied once"
            );
        }
        self.seen = self.host.sink.batches().len();

        for root in 0..ROOTS {
            if self.sched.transition_of(RootKey(root)).is_some() {
                assert!(self.model.live.contains_key(&root));
            }
        }
    }

    /// Resolves every handle and drains until nothing is left in flight.
    fn settle(&mut self) {
        for _ in 0..8 {
            for slot in &self.slots {
                if let Some(handle) = slot.get() {
                    self.sched.on_resolve(handle).expect("issued handle");
                }
            }
            let mut drained = false;
            for _ in 0..256 {
                let report = self.host.run_slice(&mut self.sched);
                self.check();
                if report.outcome == SliceOutcome::Idle {
                    drained = true;
                    break;
                }
            }
            assert!(drained, "queue drains");
            if self.sched.suspended_count() == 0 && self.sched.queue().is_empty() {
                break;
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn newest_request_commits_exactly_once(ops in proptest::collection::vec(op(), 1..60)) {
        let mut run = Run::new();
        for op in &ops {
            run.apply(op);
        }
        run.settle();

        prop_assert!(run.model.live.is_empty(), "every live render committed");
        prop_assert_eq!(run.sched.suspended_count(), 0);
        prop_assert_eq!(run.sched.pending_commits(), 0);
        prop_assert_eq!(run.sched.tree().live_count(), 0);
    }

    #[test]
    fn lower_lane_runs_within_starvation_bound(
        limit in 1..6_u32,
        urgent in 1..30_u64,
        low in 1..Lane::COUNT,
    ) {
        let mut host = TestHost::<u64>::new();
        let mut sched = Scheduler::new(SchedulerConfig {
            starvation_limit: limit,
            budget_policy: BudgetPolicy::Fixed,
            ..SchedulerConfig::interactive()
        });
        let log = ExecLog::new();

        sched.admit_root(RootKey(0), Script::done(0).logged(&log, 0), lane(low));
        for r in 1..=urgent {
            sched.admit_root(RootKey(r), Script::done(r).logged(&log, r), Lane::Immediate);
        }
        host.run_slice(&mut sched);

        let bound = usize::try_from(urgent).unwrap().min(limit as usize);
        prop_assert_eq!(log.position(0), Some(bound));
        prop_assert_eq!(host.sink.batches().len(), usize::try_from(urgent).unwrap() + 1);
    }
}
