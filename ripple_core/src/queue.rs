// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Multi-lane ready queue.
//!
//! Each lane is a FIFO ordered by admission sequence number. Lanes are served
//! in strict priority order by [`pop_highest`](LaneQueue::pop_highest); the
//! scheduler's anti-starvation policy uses [`pop_from`](LaneQueue::pop_from)
//! and [`next_nonempty_below`](LaneQueue::next_nonempty_below) to serve a
//! lower lane out of order.
//!
//! All operations are O(log n) in the number of queued tasks: each lane is a
//! `BTreeMap` keyed by sequence number and a side index maps a task back to
//! its lane and sequence for removal and reprioritization.

use alloc::collections::BTreeMap;

use hashbrown::HashMap;

use crate::lane::Lane;
use crate::task::TaskId;

/// A ready queue with one FIFO per [`Lane`].
#[derive(Debug)]
pub struct LaneQueue {
    lanes: [BTreeMap<u64, TaskId>; Lane::COUNT],
    index: HashMap<TaskId, (Lane, u64)>,
    next_seq: u64,
}

impl Default for LaneQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LaneQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lanes: core::array::from_fn(|_| BTreeMap::new()),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Appends `task` to the tail of `lane`.
    ///
    /// A task that is already queued is moved to the tail of `lane`.
    pub fn push(&mut self, task: TaskId, lane: Lane) {
        self.remove(task);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.lanes[lane.index()].insert(seq, task);
        self.index.insert(task, (lane, seq));
    }

    /// Removes and returns the oldest task in the most urgent non-empty lane.
    pub fn pop_highest(&mut self) -> Option<TaskId> {
        let lane = self.highest_nonempty()?;
        self.pop_from(lane)
    }

    /// Removes and returns the oldest task in `lane`.
    pub fn pop_from(&mut self, lane: Lane) -> Option<TaskId> {
        let (_, task) = self.lanes[lane.index()].pop_first()?;
        self.index.remove(&task);
        Some(task)
    }

    /// Removes `task` from the queue, returning the lane it was in.
    pub fn remove(&mut self, task: TaskId) -> Option<Lane> {
        let (lane, seq) = self.index.remove(&task)?;
        self.lanes[lane.index()].remove(&seq);
        Some(lane)
    }

    /// Moves a queued task to the tail of `lane`.
    ///
    /// Returns `false` if the task is not queued.
    pub fn reprioritize(&mut self, task: TaskId, lane: Lane) -> bool {
        if !self.index.contains_key(&task) {
            return false;
        }
        self.push(task, lane);
        true
    }

    /// Returns the lane a queued task waits in.
    #[must_use]
    pub fn lane_of(&self, task: TaskId) -> Option<Lane> {
        self.index.get(&task).map(|&(lane, _)| lane)
    }

    /// Returns whether `task` is queued.
    #[must_use]
    pub fn contains(&self, task: TaskId) -> bool {
        self.index.contains_key(&task)
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns whether no task is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the number of tasks queued in `lane`.
    #[must_use]
    pub fn len_of(&self, lane: Lane) -> usize {
        self.lanes[lane.index()].len()
    }

    /// Returns the most urgent lane with queued tasks.
    #[must_use]
    pub fn highest_nonempty(&self) -> Option<Lane> {
        Lane::ALL
            .into_iter()
            .find(|lane| !self.lanes[lane.index()].is_empty())
    }

    /// Returns the most urgent non-empty lane strictly below `lane`.
    #[must_use]
    pub fn next_nonempty_below(&self, lane: Lane) -> Option<Lane> {
        Lane::ALL[lane.index() + 1..]
            .iter()
            .copied()
            .find(|l| !self.lanes[l.index()].is_empty())
    }

    /// Iterates queued tasks of `lane` from oldest to newest.
    pub fn iter_lane(&self, lane: Lane) -> impl Iterator<Item = TaskId> + '_ {
        self.lanes[lane.index()].values().copied()
    }
}
