// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, TaskId};
use super::store::TaskTree;

/// An iterator over the direct children of a task, in render order.
///
/// Created by [`TaskTree::children`].
pub struct Children<'a, O> {
    tree: &'a TaskTree<O>,
    current: u32,
}

impl<'a, O> Children<'a, O> {
    pub(crate) fn new(tree: &'a TaskTree<O>, first: u32) -> Self {
        Self {
            tree,
            current: first,
        }
    }
}

impl<O> core::fmt::Debug for Children<'_, O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Children")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl<O> Iterator for Children<'_, O> {
    type Item = TaskId;

    fn next(&mut self) -> Option<TaskId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.next_sibling[idx as usize];
        Some(self.tree.id_at(idx))
    }
}

/// A pre-order iterator over a task and all of its descendants.
///
/// Pre-order matches render order: a parent is yielded before its children,
/// and siblings in the order they were admitted. Created by
/// [`TaskTree::subtree`].
pub struct Subtree<'a, O> {
    tree: &'a TaskTree<O>,
    top: u32,
    next: u32,
}

impl<'a, O> Subtree<'a, O> {
    pub(crate) fn new(tree: &'a TaskTree<O>, top: u32) -> Self {
        Self {
            tree,
            top,
            next: top,
        }
    }
}

impl<O> core::fmt::Debug for Subtree<'_, O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subtree")
            .field("top", &self.top)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl<O> Iterator for Subtree<'_, O> {
    type Item = TaskId;

    fn next(&mut self) -> Option<TaskId> {
        if self.next == INVALID {
            return None;
        }
        let idx = self.next;
        self.next = preorder_successor(self.tree, idx, self.top);
        Some(self.tree.id_at(idx))
    }
}

/// Returns the slot visited after `idx` in a pre-order walk bounded by `top`.
fn preorder_successor<O>(tree: &TaskTree<O>, idx: u32, top: u32) -> u32 {
    let first = tree.first_child[idx as usize];
    if first != INVALID {
        return first;
    }
    let mut node = idx;
    loop {
        if node == top {
            return INVALID;
        }
        let sibling = tree.next_sibling[node as usize];
        if sibling != INVALID {
            return sibling;
        }
        node = tree.parent[node as usize];
        if node == INVALID {
            return INVALID;
        }
    }
}
