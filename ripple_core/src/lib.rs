// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative render scheduling for a single UI thread.
//!
//! `ripple_core` turns render work into a tree of small, resumable tasks and
//! drives them in host-granted time slices. It is `no_std` compatible (with
//! `alloc`), keeps tasks in struct-of-arrays storage with generational
//! handles, and never reads a platform clock on its own.
//!
//! # Architecture
//!
//! ```text
//!   admit_root / admit / start_transition
//!       │
//!       ▼
//!   TaskTree ──► LaneQueue ──► Scheduler::run_slice()
//!                    ▲              │  Work::step()
//!                    │              ├── Done ──────► CommitCoordinator
//!                    │              ├── Continue ──┐       │ try_commit
//!                    ├──────────────┘              │       ▼
//!                    │              └── Suspend ───┼► CommitSink::apply()
//!                    │                    │        │
//!                    │                    ▼        │
//!   on_resolve ──► SuspenseTracker ───────┘        │
//!                    └─────────────────────────────┘
//! ```
//!
//! **[`task`]**: Struct-of-arrays task tree with generational ids. Each
//! render request for a root gets a fresh [`Generation`](task::Generation).
//!
//! **[`lane`]** / **[`queue`]**: Five priority lanes and the FIFO-per-lane
//! queue the scheduler pops from.
//!
//! **[`scheduler`]**: The slice loop, anti-starvation, fault isolation and
//! adaptive slice budget.
//!
//! **[`work`]**: The [`Work`](work::Work) trait and the
//! [`Checkpoint`](work::Checkpoint) a step polls to decide when to yield.
//!
//! **[`suspense`]**: Handles that park tasks on asynchronous dependencies.
//!
//! **[`transition`]**: Low-urgency renders that newer mutations supersede.
//!
//! **[`commit`]**: Generation checks and atomic batches handed to the host.
//!
//! **[`host`]**: Traits a host implements: [`Clock`](host::Clock),
//! [`CommitSink`](host::CommitSink), [`ErrorBoundary`](host::ErrorBoundary).
//!
//! **[`error`]**: [`SchedError`](error::SchedError) for API misuse and
//! [`Fault`](error::Fault) for failures reported to error boundaries.
//!
//! **[`time`]**: Tick-based host time.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! slice instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-task start
//!   and step events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod commit;
pub mod error;
pub mod host;
pub mod lane;
pub mod queue;
pub mod scheduler;
pub mod suspense;
pub mod task;
pub mod time;
pub mod trace;
pub mod transition;
pub mod work;
