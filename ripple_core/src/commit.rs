// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Commit gating.
//!
//! When every task in a root's render subtree has completed, the scheduler
//! queues a [`ReadyRoot`] with the [`CommitCoordinator`]. At the end of the
//! slice the coordinator revalidates each ready root against the tree, in
//! lane order, and either assembles an immutable [`CommitBatch`] for the
//! host's [`CommitSink`](crate::host::CommitSink) or rejects it.
//!
//! Outputs stay in the tree until a batch is accepted, so a rejected root
//! loses nothing and can still commit once it resolves again.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::lane::Lane;
use crate::task::{Generation, RootKey, TaskId, TaskStatus, TaskTree};

/// One task's output inside a [`CommitBatch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitEntry<O> {
    /// The task that produced the output.
    pub task: TaskId,
    /// The task's parent within the batch (`None` for the batch root).
    pub parent: Option<TaskId>,
    /// The output.
    pub output: O,
}

/// A fully resolved render subtree, ready to be applied atomically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitBatch<O> {
    root: RootKey,
    task: TaskId,
    generation: Generation,
    lane: Lane,
    entries: Vec<CommitEntry<O>>,
}

impl<O> CommitBatch<O> {
    /// The render root this batch belongs to.
    #[must_use]
    pub fn root(&self) -> RootKey {
        self.root
    }

    /// The root task of the committed subtree.
    #[must_use]
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// The generation the subtree was rendered for.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The lane the render ran in.
    #[must_use]
    pub fn lane(&self) -> Lane {
        self.lane
    }

    /// Outputs in render (pre-)order.
    #[must_use]
    pub fn entries(&self) -> &[CommitEntry<O>] {
        &self.entries
    }

    /// Iterates outputs in render order.
    pub fn outputs(&self) -> impl Iterator<Item = &O> {
        self.entries.iter().map(|e| &e.output)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the batch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of [`CommitCoordinator::try_commit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The batch was accepted and handed to the sink.
    Committed,
    /// The batch was discarded.
    Rejected(RejectReason),
}

/// Why a ready root was not committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// A newer render for the root was requested.
    StaleGeneration,
    /// The root's in-flight render is no longer this task (committed
    /// already, or unmounted).
    Superseded,
    /// Some task in the subtree is not `Completed`.
    Unresolved,
}

impl RejectReason {
    /// Short label for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StaleGeneration => "stale-generation",
            Self::Superseded => "superseded",
            Self::Unresolved => "unresolved",
        }
    }
}

/// A root subtree that resolved and waits for the end-of-slice commit pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadyRoot {
    /// The render root.
    pub root: RootKey,
    /// The root task of the resolved subtree.
    pub task: TaskId,
    /// The generation the subtree was rendered for.
    pub generation: Generation,
    /// The lane the batch is ordered by.
    pub lane: Lane,
}

/// Holds ready roots and validates them at commit time.
#[derive(Debug)]
pub struct CommitCoordinator {
    ready: [VecDeque<ReadyRoot>; Lane::COUNT],
}

impl Default for CommitCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ready: core::array::from_fn(|_| VecDeque::new()),
        }
    }

    /// Queues a ready root. Queuing the same task twice is a no-op.
    pub fn enqueue(&mut self, ready: ReadyRoot) {
        let lane = &mut self.ready[ready.lane.index()];
        if !lane.iter().any(|r| r.task == ready.task) {
            lane.push_back(ready);
        }
    }

    /// Removes the next ready root: most urgent lane first, FIFO within it.
    pub fn pop_next(&mut self) -> Option<ReadyRoot> {
        self.ready.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Number of queued ready roots.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.ready.iter().map(VecDeque::len).sum()
    }

    /// Validates a ready root against the tree and, if it still holds,
    /// moves the outputs out of the tree into a [`CommitBatch`].
    ///
    /// The tree is left untouched on rejection.
    pub fn try_commit<O>(
        &self,
        ready: &ReadyRoot,
        tree: &mut TaskTree<O>,
    ) -> Result<CommitBatch<O>, RejectReason> {
        let Some(record) = tree.root_record(ready.root) else {
            return Err(RejectReason::Superseded);
        };
        if record.generation > ready.generation {
            return Err(RejectReason::StaleGeneration);
        }
        if record.live != Some(ready.task) {
            return Err(RejectReason::Superseded);
        }
        let Some(order) = tree.subtree(ready.task) else {
            return Err(RejectReason::Superseded);
        };
        let order: Vec<TaskId> = order.collect();
        let resolved = order.iter().all(|&t| {
            tree.status(t) == Some(TaskStatus::Completed) && tree.output[t.idx as usize].is_some()
        });
        if !resolved {
            return Err(RejectReason::Unresolved);
        }

        let mut entries = Vec::with_capacity(order.len());
        for task in order {
            let parent = if task == ready.task {
                None
            } else {
                tree.parent(task)
            };
            if let Some(output) = tree.take_output(task) {
                entries.push(CommitEntry {
                    task,
                    parent,
                    output,
                });
            }
        }
        Ok(CommitBatch {
            root: ready.root,
            task: ready.task,
            generation: ready.generation,
            lane: ready.lane,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    use super::*;
    use crate::error::WorkFault;
    use crate::work::{Step, Work, from_fn};

    const R: RootKey = RootKey(1);

    fn noop() -> Box<dyn Work<&'static str>> {
        Box::new(from_fn(|_| Ok::<_, WorkFault>(Step::Done(""))))
    }

    fn finish(tree: &mut TaskTree<&'static str>, t: TaskId, out: &'static str) {
        tree.set_status(t, TaskStatus::Active).unwrap();
        tree.complete(t, out).unwrap();
    }

    fn ready(tree: &TaskTree<&'static str>, task: TaskId) -> ReadyRoot {
        ReadyRoot {
            root: R,
            task,
            generation: tree.generation(task).unwrap(),
            lane: tree.lane(task).unwrap(),
        }
    }

    #[test]
    fn resolved_subtree_commits_in_render_order() {
        let mut tree = TaskTree::new();
        let g = tree.begin_render(R, Lane::Normal);
        let root = tree.alloc(R, None, noop(), Lane::Normal, g);
        tree.set_live(R, Some(root));
        let a = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let b = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        finish(&mut tree, b, "b");
        finish(&mut tree, root, "root");
        finish(&mut tree, a, "a");

        let coord = CommitCoordinator::new();
        let batch = coord.try_commit(&ready(&tree, root), &mut tree).unwrap();
        let outs: Vec<_> = batch.outputs().copied().collect();
        assert_eq!(outs, ["root", "a", "b"]);
        assert_eq!(batch.entries()[1].parent, Some(root));
        assert_eq!(batch.entries()[0].parent, None);
        assert_eq!(batch.generation(), Generation::FIRST);
    }

    #[test]
    fn unresolved_subtree_is_rejected_without_losing_outputs() {
        let mut tree = TaskTree::new();
        let g = tree.begin_render(R, Lane::Normal);
        let root = tree.alloc(R, None, noop(), Lane::Normal, g);
        tree.set_live(R, Some(root));
        let child = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        finish(&mut tree, root, "root");

        let coord = CommitCoordinator::new();
        let r = ready(&tree, root);
        assert_eq!(
            coord.try_commit(&r, &mut tree),
            Err(RejectReason::Unresolved)
        );
        finish(&mut tree, child, "child");
        let batch = coord.try_commit(&r, &mut tree).unwrap();
        assert_eq!(batch.len(), 2, "root output survived the rejection");
    }

    #[test]
    fn newer_generation_rejects_older_batch() {
        let mut tree = TaskTree::new();
        let g = tree.begin_render(R, Lane::Transition);
        let root = tree.alloc(R, None, noop(), Lane::Transition, g);
        tree.set_live(R, Some(root));
        finish(&mut tree, root, "old");
        let r = ready(&tree, root);
        tree.begin_render(R, Lane::Transition);

        let coord = CommitCoordinator::new();
        assert_eq!(
            coord.try_commit(&r, &mut tree),
            Err(RejectReason::StaleGeneration)
        );
    }

    #[test]
    fn ready_roots_drain_by_lane_then_fifo() {
        let mut coord = CommitCoordinator::new();
        let mk = |idx, lane| ReadyRoot {
            root: RootKey(u64::from(idx)),
            task: TaskId::from_raw(idx, 0),
            generation: Generation::FIRST,
            lane,
        };
        coord.enqueue(mk(1, Lane::Idle));
        coord.enqueue(mk(2, Lane::Normal));
        coord.enqueue(mk(3, Lane::Normal));
        coord.enqueue(mk(2, Lane::Normal));
        coord.enqueue(mk(4, Lane::Immediate));
        assert_eq!(coord.pending(), 4, "duplicate ignored");

        let order: Vec<_> = core::iter::from_fn(|| coord.pop_next())
            .map(|r| r.task.index())
            .collect();
        assert_eq!(order, [4, 2, 3, 1]);
    }
}
