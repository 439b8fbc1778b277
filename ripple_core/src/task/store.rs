// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays task storage with allocation, topology, and root tracking.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use super::id::{Generation, INVALID, RootKey, TaskId, TaskStatus};
use super::traverse::{Children, Subtree};
use crate::error::{SchedError, invariant};
use crate::lane::Lane;
use crate::suspense::SuspenseHandle;
use crate::time::HostTime;
use crate::work::Work;

/// Per-root render bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RootRecord {
    /// Generation of the newest render request for this root.
    pub(crate) generation: Generation,
    /// The root task of the in-flight render, if any.
    pub(crate) live: Option<TaskId>,
    /// Lane of the most recent render request.
    pub(crate) lane: Lane,
}

/// A task cancelled by [`TaskTree::abort_subtree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AbortedTask {
    pub(crate) task: TaskId,
    /// The status the task had before it was aborted.
    pub(crate) was: TaskStatus,
    pub(crate) suspended_on: Option<SuspenseHandle>,
}

/// Struct-of-arrays storage for all tasks.
///
/// Tasks are addressed by [`TaskId`] handles. Internally, each task occupies
/// a slot in parallel arrays. Released tasks are recycled via a free list,
/// and slot epochs prevent stale handle access.
pub struct TaskTree<O> {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) last_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Scheduling state --
    pub(crate) root: Vec<RootKey>,
    pub(crate) lane: Vec<Lane>,
    pub(crate) status: Vec<TaskStatus>,
    pub(crate) generation: Vec<Generation>,
    pub(crate) boundary: Vec<bool>,
    pub(crate) suspended_on: Vec<Option<SuspenseHandle>>,
    pub(crate) suspended_at: Vec<HostTime>,

    // -- Payload --
    pub(crate) work: Vec<Option<Box<dyn Work<O>>>>,
    pub(crate) output: Vec<Option<O>>,

    // -- Allocation --
    pub(crate) epoch: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Roots --
    pub(crate) roots: HashMap<RootKey, RootRecord>,
}

impl<O> Default for TaskTree<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> fmt::Debug for TaskTree<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskTree")
            .field("live", &self.live_count())
            .field("slots", &self.len)
            .field("roots", &self.roots.len())
            .finish_non_exhaustive()
    }
}

impl<O> TaskTree<O> {
    /// Creates an empty task tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            last_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            root: Vec::new(),
            lane: Vec::new(),
            status: Vec::new(),
            generation: Vec::new(),
            boundary: Vec::new(),
            suspended_on: Vec::new(),
            suspended_at: Vec::new(),
            work: Vec::new(),
            output: Vec::new(),
            epoch: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            roots: HashMap::new(),
        }
    }

    // -- Allocation --

    /// Allocates a `Pending` task, appending it as the last child of
    /// `parent` when given.
    pub(crate) fn alloc(
        &mut self,
        root: RootKey,
        parent: Option<TaskId>,
        work: Box<dyn Work<O>>,
        lane: Lane,
        generation: Generation,
    ) -> TaskId {
        let idx = if let Some(idx) = self.free_list.pop() {
            let i = idx as usize;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.last_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.root[i] = root;
            self.lane[i] = lane;
            self.status[i] = TaskStatus::Pending;
            self.generation[i] = generation;
            self.boundary[i] = false;
            self.suspended_on[i] = None;
            self.suspended_at[i] = HostTime::default();
            self.work[i] = Some(work);
            self.output[i] = None;
            self.alive[i] = true;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.last_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.root.push(root);
            self.lane.push(lane);
            self.status.push(TaskStatus::Pending);
            self.generation.push(generation);
            self.boundary.push(false);
            self.suspended_on.push(None);
            self.suspended_at.push(HostTime::default());
            self.work.push(Some(work));
            self.output.push(None);
            self.epoch.push(0);
            self.alive.push(true);
            idx
        };

        if let Some(p) = parent {
            self.link_last_child(p.idx, idx);
        }

        self.id_at(idx)
    }

    /// Releases a task and all of its descendants, freeing their slots.
    ///
    /// Outputs and work still held by the released tasks are dropped.
    pub(crate) fn release_subtree(&mut self, id: TaskId) {
        if !self.is_alive(id) {
            return;
        }
        let slots: Vec<u32> = self.subtree_slots(id.idx);
        if self.parent[id.idx as usize] != INVALID {
            self.unlink_from_parent(id.idx);
        }
        for idx in slots {
            let i = idx as usize;
            self.work[i] = None;
            self.output[i] = None;
            self.suspended_on[i] = None;
            self.alive[i] = false;
            // Bump the epoch so old handles immediately fail validation.
            self.epoch[i] = self.epoch[i].wrapping_add(1);
            self.free_list.push(idx);
        }
    }

    /// Returns whether the given handle refers to a live task.
    #[must_use]
    pub fn is_alive(&self, id: TaskId) -> bool {
        (id.idx < self.len) && self.alive[id.idx as usize] && self.epoch[id.idx as usize] == id.epoch
    }

    /// Returns the number of live tasks.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.len as usize - self.free_list.len()
    }

    // -- Queries --

    /// Returns the status of a task, or `None` if the handle is stale.
    #[must_use]
    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.is_alive(id).then(|| self.status[id.idx as usize])
    }

    /// Returns the lane of a task.
    #[must_use]
    pub fn lane(&self, id: TaskId) -> Option<Lane> {
        self.is_alive(id).then(|| self.lane[id.idx as usize])
    }

    /// Returns the generation a task was admitted with.
    #[must_use]
    pub fn generation(&self, id: TaskId) -> Option<Generation> {
        self.is_alive(id).then(|| self.generation[id.idx as usize])
    }

    /// Returns the render root a task belongs to.
    #[must_use]
    pub fn root_of(&self, id: TaskId) -> Option<RootKey> {
        self.is_alive(id).then(|| self.root[id.idx as usize])
    }

    /// Returns the parent of a task, if any.
    #[must_use]
    pub fn parent(&self, id: TaskId) -> Option<TaskId> {
        if !self.is_alive(id) {
            return None;
        }
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.id_at(p))
    }

    /// Returns an iterator over the direct children of a task in render
    /// order, or `None` if the handle is stale.
    #[must_use]
    pub fn children(&self, id: TaskId) -> Option<Children<'_, O>> {
        self.is_alive(id)
            .then(|| Children::new(self, self.first_child[id.idx as usize]))
    }

    /// Returns a pre-order iterator over a task and its descendants.
    #[must_use]
    pub fn subtree(&self, id: TaskId) -> Option<Subtree<'_, O>> {
        self.is_alive(id).then(|| Subtree::new(self, id.idx))
    }

    /// Returns whether the task is a registered error boundary.
    #[must_use]
    pub fn is_boundary(&self, id: TaskId) -> bool {
        self.is_alive(id) && self.boundary[id.idx as usize]
    }

    /// Returns the root task of the in-flight render for `root`.
    #[must_use]
    pub fn live_task(&self, root: RootKey) -> Option<TaskId> {
        self.roots.get(&root).and_then(|r| r.live)
    }

    /// Returns the newest generation issued for `root`.
    #[must_use]
    pub fn root_generation(&self, root: RootKey) -> Option<Generation> {
        self.roots.get(&root).map(|r| r.generation)
    }

    /// Returns the number of live tasks with the given status.
    #[must_use]
    pub fn count_status(&self, status: TaskStatus) -> usize {
        (0..self.len as usize)
            .filter(|&i| self.alive[i] && self.status[i] == status)
            .count()
    }

    /// Returns whether the task is alive and was admitted for its root's
    /// newest generation.
    #[must_use]
    pub fn is_current(&self, id: TaskId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let i = id.idx as usize;
        self.roots
            .get(&self.root[i])
            .is_some_and(|r| r.generation == self.generation[i])
    }

    /// Returns whether every task in the subtree has `Completed`.
    #[must_use]
    pub fn is_resolved(&self, id: TaskId) -> bool {
        self.subtree(id).is_some_and(|mut tasks| {
            tasks.all(|t| self.status[t.idx as usize] == TaskStatus::Completed)
        })
    }

    /// Walks parent links up to the top of the task's render subtree.
    #[must_use]
    pub fn top_of(&self, id: TaskId) -> Option<TaskId> {
        if !self.is_alive(id) {
            return None;
        }
        let mut idx = id.idx;
        while self.parent[idx as usize] != INVALID {
            idx = self.parent[idx as usize];
        }
        Some(self.id_at(idx))
    }

    /// Returns the closest strict ancestor registered as an error boundary.
    #[must_use]
    pub fn nearest_boundary(&self, id: TaskId) -> Option<TaskId> {
        if !self.is_alive(id) {
            return None;
        }
        let mut idx = self.parent[id.idx as usize];
        while idx != INVALID {
            if self.boundary[idx as usize] {
                return Some(self.id_at(idx));
            }
            idx = self.parent[idx as usize];
        }
        None
    }

    /// Returns every live suspended task with its handle and suspension time.
    pub(crate) fn suspended(&self) -> Vec<(TaskId, SuspenseHandle, HostTime)> {
        (0..self.len)
            .filter(|&idx| {
                let i = idx as usize;
                self.alive[i] && self.status[i] == TaskStatus::Suspended
            })
            .filter_map(|idx| {
                let i = idx as usize;
                self.suspended_on[i].map(|h| (self.id_at(idx), h, self.suspended_at[i]))
            })
            .collect()
    }

    // -- Mutation --

    /// Moves a task to a new status, checking the transition is legal.
    pub(crate) fn set_status(&mut self, id: TaskId, next: TaskStatus) -> Result<(), SchedError> {
        if !self.is_alive(id) {
            return Err(SchedError::UnknownTask(id));
        }
        let current = self.status[id.idx as usize];
        invariant!(
            current.can_transition_to(next),
            "illegal task status transition"
        );
        self.status[id.idx as usize] = next;
        Ok(())
    }

    pub(crate) fn set_lane(&mut self, id: TaskId, lane: Lane) {
        self.lane[id.idx as usize] = lane;
    }

    pub(crate) fn set_boundary(&mut self, id: TaskId, boundary: bool) {
        self.boundary[id.idx as usize] = boundary;
    }

    pub(crate) fn take_work(&mut self, id: TaskId) -> Option<Box<dyn Work<O>>> {
        self.work[id.idx as usize].take()
    }

    pub(crate) fn restore_work(&mut self, id: TaskId, work: Box<dyn Work<O>>) {
        self.work[id.idx as usize] = Some(work);
    }

    /// Marks an `Active` task `Completed` and stores its output.
    pub(crate) fn complete(&mut self, id: TaskId, output: O) -> Result<(), SchedError> {
        self.set_status(id, TaskStatus::Completed)?;
        let i = id.idx as usize;
        self.work[i] = None;
        self.output[i] = Some(output);
        Ok(())
    }

    pub(crate) fn take_output(&mut self, id: TaskId) -> Option<O> {
        self.output[id.idx as usize].take()
    }

    /// Marks an `Active` task `Suspended` on `handle`.
    pub(crate) fn suspend(
        &mut self,
        id: TaskId,
        handle: SuspenseHandle,
        at: HostTime,
    ) -> Result<(), SchedError> {
        self.set_status(id, TaskStatus::Suspended)?;
        let i = id.idx as usize;
        self.suspended_on[i] = Some(handle);
        self.suspended_at[i] = at;
        Ok(())
    }

    /// Moves a `Suspended` task back to `Pending`.
    pub(crate) fn resume(&mut self, id: TaskId) -> Result<(), SchedError> {
        self.set_status(id, TaskStatus::Pending)?;
        self.suspended_on[id.idx as usize] = None;
        Ok(())
    }

    /// Aborts every unfinished task in the subtree rooted at `id`.
    ///
    /// Completed tasks keep their status and output. Aborted tasks drop their
    /// work. Returns the tasks whose status changed.
    pub(crate) fn abort_subtree(&mut self, id: TaskId) -> Vec<AbortedTask> {
        if !self.is_alive(id) {
            return Vec::new();
        }
        let mut aborted = Vec::new();
        for idx in self.subtree_slots(id.idx) {
            let i = idx as usize;
            let was = self.status[i];
            if !was.is_unfinished() {
                continue;
            }
            self.status[i] = TaskStatus::Aborted;
            self.work[i] = None;
            aborted.push(AbortedTask {
                task: self.id_at(idx),
                was,
                suspended_on: self.suspended_on[i].take(),
            });
        }
        aborted
    }

    // -- Roots --

    /// Starts a new render for `root` and returns its generation.
    ///
    /// The first render of a root gets [`Generation::FIRST`]; every later one
    /// gets the next generation.
    pub(crate) fn begin_render(&mut self, root: RootKey, lane: Lane) -> Generation {
        let record = self.roots.entry(root).or_insert(RootRecord {
            generation: Generation::default(),
            live: None,
            lane,
        });
        record.generation = record.generation.next();
        record.lane = lane;
        record.generation
    }

    pub(crate) fn set_live(&mut self, root: RootKey, live: Option<TaskId>) {
        if let Some(record) = self.roots.get_mut(&root) {
            record.live = live;
        }
    }

    pub(crate) fn root_record(&self, root: RootKey) -> Option<RootRecord> {
        self.roots.get(&root).copied()
    }

    // -- Internal helpers --

    pub(crate) fn id_at(&self, idx: u32) -> TaskId {
        TaskId {
            idx,
            epoch: self.epoch[idx as usize],
        }
    }

    fn subtree_slots(&self, top: u32) -> Vec<u32> {
        Subtree::new(self, top).map(|t| t.idx).collect()
    }

    fn link_last_child(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        let last = self.last_child[p as usize];
        if last == INVALID {
            self.first_child[p as usize] = c;
        } else {
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }
        self.last_child[p as usize] = c;
    }

    fn unlink_from_parent(&mut self, c: u32) {
        let p = self.parent[c as usize];
        let prev = self.prev_sibling[c as usize];
        let next = self.next_sibling[c as usize];

        if prev == INVALID {
            self.first_child[p as usize] = next;
        } else {
            self.next_sibling[prev as usize] = next;
        }
        if next == INVALID {
            self.last_child[p as usize] = prev;
        } else {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[c as usize] = INVALID;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;
    use crate::error::WorkFault;
    use crate::work::{Step, from_fn};

    fn noop() -> Box<dyn Work<u32>> {
        Box::new(from_fn(|_| Ok::<_, WorkFault>(Step::Done(0))))
    }

    const R: RootKey = RootKey(7);

    fn tree_with_root() -> (TaskTree<u32>, TaskId) {
        let mut tree = TaskTree::new();
        let generation = tree.begin_render(R, Lane::Normal);
        let root = tree.alloc(R, None, noop(), Lane::Normal, generation);
        tree.set_live(R, Some(root));
        (tree, root)
    }

    #[test]
    fn children_iterate_in_admission_order() {
        let (mut tree, root) = tree_with_root();
        let g = Generation::FIRST;
        let a = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let b = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let c = tree.alloc(R, Some(root), noop(), Lane::Normal, g);

        let kids: Vec<_> = tree.children(root).into_iter().flatten().collect();
        assert_eq!(kids, [a, b, c]);
        assert_eq!(tree.parent(b), Some(root));
        assert_eq!(tree.parent(root), None);
    }

    #[test]
    fn subtree_is_preorder() {
        let (mut tree, root) = tree_with_root();
        let g = Generation::FIRST;
        let a = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let a1 = tree.alloc(R, Some(a), noop(), Lane::Normal, g);
        let b = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let a2 = tree.alloc(R, Some(a), noop(), Lane::Normal, g);

        let order: Vec<_> = tree.subtree(root).into_iter().flatten().collect();
        assert_eq!(order, [root, a, a1, a2, b]);

        let inner: Vec<_> = tree.subtree(a).into_iter().flatten().collect();
        assert_eq!(inner, [a, a1, a2], "walk stays inside the subtree");
    }

    #[test]
    fn released_handles_are_stale_and_slots_reused() {
        let (mut tree, root) = tree_with_root();
        let child = tree.alloc(R, Some(root), noop(), Lane::Normal, Generation::FIRST);
        tree.release_subtree(root);

        assert!(!tree.is_alive(root));
        assert!(!tree.is_alive(child));
        assert_eq!(tree.status(child), None);
        assert_eq!(tree.live_count(), 0);

        let fresh = tree.alloc(R, None, noop(), Lane::Idle, Generation(2));
        assert!(
            fresh.index() == root.index() || fresh.index() == child.index(),
            "freed slot reused"
        );
        assert!(fresh != root && fresh != child, "epoch distinguishes reuse");
    }

    #[test]
    fn releasing_a_middle_child_relinks_siblings() {
        let (mut tree, root) = tree_with_root();
        let g = Generation::FIRST;
        let a = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let b = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let c = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        tree.release_subtree(b);

        let kids: Vec<_> = tree.children(root).into_iter().flatten().collect();
        assert_eq!(kids, [a, c]);
        let d = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let kids: Vec<_> = tree.children(root).into_iter().flatten().collect();
        assert_eq!(kids, [a, c, d], "last-child link survives unlink");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "illegal task status transition")]
    fn illegal_transition_panics_in_debug() {
        let (mut tree, root) = tree_with_root();
        let _ = tree.set_status(root, TaskStatus::Completed);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn illegal_transition_is_an_error_in_release() {
        let (mut tree, root) = tree_with_root();
        assert!(matches!(
            tree.set_status(root, TaskStatus::Completed),
            Err(SchedError::InvariantViolation(_))
        ));
        assert_eq!(tree.status(root), Some(TaskStatus::Pending), "no-op");
    }

    #[test]
    fn abort_skips_completed_descendants() {
        let (mut tree, root) = tree_with_root();
        let g = Generation::FIRST;
        let done = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        let waiting = tree.alloc(R, Some(root), noop(), Lane::Normal, g);
        tree.set_status(done, TaskStatus::Active).unwrap();
        tree.complete(done, 5).unwrap();

        let aborted = tree.abort_subtree(root);
        let ids: Vec<_> = aborted.iter().map(|a| a.task).collect();
        assert_eq!(ids, [root, waiting]);
        assert_eq!(tree.status(done), Some(TaskStatus::Completed));
        assert_eq!(tree.status(waiting), Some(TaskStatus::Aborted));
        assert!(!tree.is_resolved(root));
    }

    #[test]
    fn generation_tracks_root_renders() {
        let (mut tree, root) = tree_with_root();
        assert!(tree.is_current(root));
        assert_eq!(tree.begin_render(R, Lane::Normal), Generation(2));
        assert!(!tree.is_current(root), "older generation is stale");
    }

    #[test]
    fn nearest_boundary_skips_self() {
        let (mut tree, root) = tree_with_root();
        let mid = tree.alloc(R, Some(root), noop(), Lane::Normal, Generation::FIRST);
        let leaf = tree.alloc(R, Some(mid), noop(), Lane::Normal, Generation::FIRST);
        tree.set_boundary(root, true);
        tree.set_boundary(leaf, true);

        assert_eq!(tree.nearest_boundary(leaf), Some(root));
        assert_eq!(tree.nearest_boundary(root), None);
        assert_eq!(tree.top_of(leaf), Some(root));
    }
}
