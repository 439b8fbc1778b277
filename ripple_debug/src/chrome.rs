// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Converts a [`RecorderSink`](crate::recorder::RecorderSink) recording into
//! the JSON that `chrome://tracing` and Perfetto load ([format][fmt]).
//!
//! Slices and their phases become duration events on thread 0. Per-task
//! steps (when recorded with `trace-rich`) become duration events on a thread
//! per lane.
//!
//! [fmt]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use ripple_core::lane::Lane;
use ripple_core::time::Timebase;

use crate::recorder::{RecordedEvent, decode};

/// Writes the events in `bytes` to `writer` as one JSON array.
///
/// `timebase` gives the tick length of the recording's host clock.
pub fn export(bytes: &[u8], timebase: Timebase, writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::SliceBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": "Slice",
                    "cat": "Scheduler",
                    "ts": micros(e.now.ticks(), timebase),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "slice_index": e.slice_index,
                        "budget_us": micros(e.budget.ticks(), timebase),
                        "queued": e.queued,
                    }
                }));
            }
            RecordedEvent::SliceEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": "Slice",
                    "cat": "Scheduler",
                    "ts": micros(e.now.ticks(), timebase),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "slice_index": e.slice_index,
                        "outcome": format!("{:?}", e.outcome),
                        "tasks_run": e.tasks_run,
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": e.phase.as_str(),
                    "cat": "Slice",
                    "ts": micros(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "slice_index": e.slice_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": e.phase.as_str(),
                    "cat": "Slice",
                    "ts": micros(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "slice_index": e.slice_index,
                    }
                }));
            }
            RecordedEvent::Discard(e) => {
                events.push(instant(
                    "Discard",
                    "Queue",
                    micros(e.timestamp.ticks(), timebase),
                    lane_tid(e.lane),
                    json!({
                        "slice_index": e.slice_index,
                        "task": format!("{:?}", e.task),
                        "reason": e.reason.as_str(),
                    }),
                ));
            }
            RecordedEvent::Suspense(e) => {
                events.push(instant(
                    "Suspense",
                    "Suspense",
                    micros(e.timestamp.ticks(), timebase),
                    0,
                    json!({
                        "slice_index": e.slice_index,
                        "handle": e.handle.raw(),
                        "task": e.task.map(|t| format!("{t:?}")),
                        "kind": e.kind.as_str(),
                    }),
                ));
            }
            RecordedEvent::Commit(e) => {
                events.push(instant(
                    if e.rejected().is_some() {
                        "CommitRejected"
                    } else {
                        "Commit"
                    },
                    "Commit",
                    micros(e.timestamp.ticks(), timebase),
                    0,
                    json!({
                        "slice_index": e.slice_index,
                        "root": e.root.0,
                        "generation": e.generation.0,
                        "lane": e.lane.as_str(),
                        "entries": e.entries,
                        "reason": e.rejected().map(|r| r.as_str()),
                    }),
                ));
            }
            RecordedEvent::Fault(e) => {
                events.push(instant(
                    "Fault",
                    "Fault",
                    micros(e.timestamp.ticks(), timebase),
                    0,
                    json!({
                        "slice_index": e.slice_index,
                        "task": format!("{:?}", e.task),
                        "root": e.root.0,
                        "boundary": e.boundary.map(|t| format!("{t:?}")),
                        "kind": format!("{:?}", e.kind),
                    }),
                ));
            }
            RecordedEvent::StarvationBoost(e) => {
                events.push(instant(
                    "StarvationBoost",
                    "Queue",
                    micros(e.timestamp.ticks(), timebase),
                    lane_tid(e.to),
                    json!({
                        "slice_index": e.slice_index,
                        "from": e.from.as_str(),
                        "to": e.to.as_str(),
                    }),
                ));
            }
            RecordedEvent::BudgetChange(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "Budget",
                    "cat": "Scheduler",
                    "ts": 0,
                    "pid": 0,
                    "args": {
                        "budget_us": micros(e.new.ticks(), timebase),
                    }
                }));
            }
            RecordedEvent::SliceSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "SliceSummary",
                    "cat": "Summary",
                    "ts": micros(s.start.ticks(), timebase),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "slice_index": s.slice_index,
                        "budget_us": micros(s.budget.ticks(), timebase),
                        "elapsed_us": micros(s.elapsed.ticks(), timebase),
                        "drain_us": micros(s.drain_ticks, timebase),
                        "commit_us": micros(s.commit_ticks, timebase),
                        "tasks_run": s.tasks_run,
                        "commits": s.commits,
                        "rejected": s.rejected,
                        "outcome": format!("{:?}", s.outcome),
                    }
                }));
            }
            RecordedEvent::TaskStart(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": format!("{:?}", e.task),
                    "cat": "Task",
                    "ts": micros(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": lane_tid(e.lane),
                    "args": {
                        "slice_index": e.slice_index,
                        "generation": e.generation.0,
                    }
                }));
            }
            RecordedEvent::TaskStep(e) => {
                // Closes the matching TaskStart, which carries the lane.
                events.push(json!({
                    "ph": "E",
                    "name": format!("{:?}", e.task),
                    "cat": "Task",
                    "ts": micros(e.timestamp.ticks(), timebase),
                    "pid": 0,
                    "tid": last_task_tid(&events),
                    "args": {
                        "step": format!("{:?}", e.step),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn instant(name: &str, cat: &str, ts: f64, tid: u64, args: Value) -> Value {
    json!({
        "ph": "i",
        "name": name,
        "cat": cat,
        "ts": ts,
        "pid": 0,
        "tid": tid,
        "s": "t",
        "args": args,
    })
}

/// Lane threads sit after the scheduler thread.
fn lane_tid(lane: Lane) -> u64 {
    lane.index() as u64 + 1
}

fn last_task_tid(events: &[Value]) -> u64 {
    events
        .iter()
        .rev()
        .find(|e| e["cat"] == "Task" && e["ph"] == "B")
        .and_then(|e| e["tid"].as_u64())
        .unwrap_or(0)
}

fn micros(ticks: u64, timebase: Timebase) -> f64 {
    timebase.ticks_to_micros(ticks)
}
