// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Task tree data model.
//!
//! A *task* is a schedulable unit of render work over one node of a render
//! tree. Each task has:
//!
//! - An identity ([`TaskId`]): a handle with a slot epoch that becomes stale
//!   when the task is released, so released ids never alias a reused slot.
//! - Topology: parent, first-child and sibling links forming an ordered tree
//!   whose pre-order is render order.
//! - Scheduling state: [`Lane`](crate::lane::Lane), [`TaskStatus`], and the
//!   [`Generation`] of its [`RootKey`] it was admitted under.
//! - A payload: the resumable [`Work`](crate::work::Work) while unfinished
//!   and the output once completed.
//!
//! Tasks are stored in struct-of-arrays layout with index-based handles. The
//! tree also keeps one record per render root: its newest generation and the
//! root task of the in-flight render. A task whose generation is older than
//! its root's is stale and will never be committed.

mod id;
mod store;
mod traverse;

pub use id::{Generation, RootKey, TaskId, TaskStatus};
pub(crate) use store::{AbortedTask, RootRecord};
pub use store::TaskTree;
pub use traverse::{Children, Subtree};
