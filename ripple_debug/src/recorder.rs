// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary trace recording.
//!
//! [`RecorderSink`] appends each scheduler event to a byte buffer as a tag
//! byte followed by little-endian fields. The buffer can be written to disk
//! and turned back into [`RecordedEvent`]s with [`decode`], or converted to a
//! Chrome trace with [`chrome::export`](crate::chrome::export).
//!
//! Decoding stops at the first unknown tag or truncated record.

use ripple_core::commit::{CommitOutcome, RejectReason};
use ripple_core::lane::Lane;
use ripple_core::scheduler::SliceOutcome;
use ripple_core::suspense::SuspenseHandle;
use ripple_core::task::{Generation, RootKey, TaskId};
use ripple_core::time::{Duration, HostTime};
use ripple_core::trace::{
    BudgetChangeEvent, CommitEvent, DiscardEvent, DiscardReason, FaultEvent, FaultKind,
    PhaseBeginEvent, PhaseEndEvent, PhaseKind, SliceBeginEvent, SliceEndEvent, SliceSummary,
    StarvationBoostEvent, StepKind, SuspenseEvent, SuspenseEventKind, TaskStartEvent,
    TaskStepEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_SLICE_BEGIN: u8 = 1;
const TAG_SLICE_END: u8 = 2;
const TAG_PHASE_BEGIN: u8 = 3;
const TAG_PHASE_END: u8 = 4;
const TAG_DISCARD: u8 = 5;
const TAG_SUSPENSE: u8 = 6;
const TAG_COMMIT: u8 = 7;
const TAG_FAULT: u8 = 8;
const TAG_STARVATION_BOOST: u8 = 9;
const TAG_BUDGET_CHANGE: u8 = 10;
const TAG_SLICE_SUMMARY: u8 = 11;
const TAG_TASK_START: u8 = 12;
const TAG_TASK_STEP: u8 = 13;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// Appends every event to an in-memory byte log.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The bytes recorded so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Takes the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_task(&mut self, t: TaskId) {
        self.write_u32(t.index());
        self.write_u32(t.epoch());
    }

    fn write_option_task(&mut self, t: Option<TaskId>) {
        match t {
            Some(t) => {
                self.write_u8(1);
                self.write_task(t);
            }
            None => {
                self.write_u8(0);
                self.write_task(TaskId::from_raw(0, 0));
            }
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "there are five lanes"
    )]
    fn write_lane(&mut self, lane: Lane) {
        self.write_u8(lane.index() as u8);
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Drain => 0,
            PhaseKind::Commit => 1,
        });
    }

    fn write_outcome(&mut self, o: SliceOutcome) {
        self.write_u8(match o {
            SliceOutcome::Idle => 0,
            SliceOutcome::YieldedToHost => 1,
        });
    }

    fn write_commit_outcome(&mut self, o: CommitOutcome) {
        self.write_u8(match o {
            CommitOutcome::Committed => 0,
            CommitOutcome::Rejected(RejectReason::StaleGeneration) => 1,
            CommitOutcome::Rejected(RejectReason::Superseded) => 2,
            CommitOutcome::Rejected(RejectReason::Unresolved) => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_slice_begin(&mut self, e: &SliceBeginEvent) {
        self.write_u8(TAG_SLICE_BEGIN);
        self.write_u64(e.slice_index);
        self.write_u64(e.now.ticks());
        self.write_u64(e.budget.ticks());
        self.write_u32(e.queued);
    }

    fn on_slice_end(&mut self, e: &SliceEndEvent) {
        self.write_u8(TAG_SLICE_END);
        self.write_u64(e.slice_index);
        self.write_u64(e.now.ticks());
        self.write_outcome(e.outcome);
        self.write_u32(e.tasks_run);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.slice_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.slice_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_discard(&mut self, e: &DiscardEvent) {
        self.write_u8(TAG_DISCARD);
        self.write_u64(e.slice_index);
        self.write_task(e.task);
        self.write_lane(e.lane);
        self.write_u8(match e.reason {
            DiscardReason::StaleGeneration => 0,
            DiscardReason::Superseded => 1,
        });
        self.write_u64(e.timestamp.ticks());
    }

    fn on_suspense(&mut self, e: &SuspenseEvent) {
        self.write_u8(TAG_SUSPENSE);
        self.write_u64(e.slice_index);
        self.write_u64(e.handle.raw());
        self.write_option_task(e.task);
        self.write_u8(match e.kind {
            SuspenseEventKind::Registered => 0,
            SuspenseEventKind::Readmitted => 1,
            SuspenseEventKind::Dropped => 2,
            SuspenseEventKind::Aborted => 3,
        });
        self.write_u64(e.timestamp.ticks());
    }

    fn on_commit(&mut self, e: &CommitEvent) {
        self.write_u8(TAG_COMMIT);
        self.write_u64(e.slice_index);
        self.write_u64(e.root.0);
        self.write_task(e.task);
        self.write_u64(e.generation.0);
        self.write_lane(e.lane);
        self.write_commit_outcome(e.outcome);
        self.write_u32(e.entries);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_fault(&mut self, e: &FaultEvent) {
        self.write_u8(TAG_FAULT);
        self.write_u64(e.slice_index);
        self.write_task(e.task);
        self.write_u64(e.root.0);
        self.write_option_task(e.boundary);
        self.write_u8(match e.kind {
            FaultKind::WorkClosure => 0,
            FaultKind::SuspensionTimeout => 1,
        });
        self.write_u64(e.timestamp.ticks());
    }

    fn on_starvation_boost(&mut self, e: &StarvationBoostEvent) {
        self.write_u8(TAG_STARVATION_BOOST);
        self.write_u64(e.slice_index);
        self.write_lane(e.from);
        self.write_lane(e.to);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_budget_change(&mut self, e: &BudgetChangeEvent) {
        self.write_u8(TAG_BUDGET_CHANGE);
        self.write_u64(e.slice_index);
        self.write_u64(e.old.ticks());
        self.write_u64(e.new.ticks());
        self.write_u64(e.elapsed_ema);
    }

    fn on_slice_summary(&mut self, s: &SliceSummary) {
        self.write_u8(TAG_SLICE_SUMMARY);
        self.write_u64(s.slice_index);
        self.write_u64(s.start.ticks());
        self.write_u64(s.budget.ticks());
        self.write_u64(s.elapsed.ticks());
        self.write_u64(s.drain_ticks);
        self.write_u64(s.commit_ticks);
        self.write_u32(s.tasks_run);
        self.write_u32(s.commits);
        self.write_u32(s.rejected);
        self.write_outcome(s.outcome);
    }

    fn on_task_start(&mut self, e: &TaskStartEvent) {
        self.write_u8(TAG_TASK_START);
        self.write_u64(e.slice_index);
        self.write_task(e.task);
        self.write_lane(e.lane);
        self.write_u64(e.generation.0);
        self.write_u64(e.timestamp.ticks());
    }

    fn on_task_step(&mut self, e: &TaskStepEvent) {
        self.write_u8(TAG_TASK_STEP);
        self.write_u64(e.slice_index);
        self.write_task(e.task);
        self.write_u8(match e.step {
            StepKind::Done => 0,
            StepKind::Suspend => 1,
            StepKind::Continue => 2,
            StepKind::Fault => 3,
        });
        self.write_u64(e.timestamp.ticks());
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// One event read back by [`decode`].
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`SliceBeginEvent`].
    SliceBegin(SliceBeginEvent),
    /// A [`SliceEndEvent`].
    SliceEnd(SliceEndEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`DiscardEvent`].
    Discard(DiscardEvent),
    /// A [`SuspenseEvent`].
    Suspense(SuspenseEvent),
    /// A [`CommitEvent`].
    Commit(CommitEvent),
    /// A [`FaultEvent`].
    Fault(FaultEvent),
    /// A [`StarvationBoostEvent`].
    StarvationBoost(StarvationBoostEvent),
    /// A [`BudgetChangeEvent`].
    BudgetChange(BudgetChangeEvent),
    /// A [`SliceSummary`].
    SliceSummary(SliceSummary),
    /// A [`TaskStartEvent`].
    TaskStart(TaskStartEvent),
    /// A [`TaskStepEvent`].
    TaskStep(TaskStepEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Returned by [`decode`].
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_duration(&mut self) -> Option<Duration> {
        self.read_u64().map(Duration)
    }

    fn read_task(&mut self) -> Option<TaskId> {
        let idx = self.read_u32()?;
        let epoch = self.read_u32()?;
        Some(TaskId::from_raw(idx, epoch))
    }

    fn read_option_task(&mut self) -> Option<Option<TaskId>> {
        let present = self.read_u8()?;
        let task = self.read_task()?;
        Some((present != 0).then_some(task))
    }

    fn read_lane(&mut self) -> Option<Lane> {
        Lane::from_index(usize::from(self.read_u8()?))
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Drain,
            _ => PhaseKind::Commit,
        })
    }

    fn read_outcome(&mut self) -> Option<SliceOutcome> {
        Some(match self.read_u8()? {
            0 => SliceOutcome::Idle,
            _ => SliceOutcome::YieldedToHost,
        })
    }

    fn read_commit_outcome(&mut self) -> Option<CommitOutcome> {
        Some(match self.read_u8()? {
            0 => CommitOutcome::Committed,
            1 => CommitOutcome::Rejected(RejectReason::StaleGeneration),
            2 => CommitOutcome::Rejected(RejectReason::Superseded),
            _ => CommitOutcome::Rejected(RejectReason::Unresolved),
        })
    }

    fn decode_slice_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SliceBegin(SliceBeginEvent {
            slice_index: self.read_u64()?,
            now: self.read_time()?,
            budget: self.read_duration()?,
            queued: self.read_u32()?,
        }))
    }

    fn decode_slice_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SliceEnd(SliceEndEvent {
            slice_index: self.read_u64()?,
            now: self.read_time()?,
            outcome: self.read_outcome()?,
            tasks_run: self.read_u32()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            slice_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            slice_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_discard(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Discard(DiscardEvent {
            slice_index: self.read_u64()?,
            task: self.read_task()?,
            lane: self.read_lane()?,
            reason: match self.read_u8()? {
                0 => DiscardReason::StaleGeneration,
                _ => DiscardReason::Superseded,
            },
            timestamp: self.read_time()?,
        }))
    }

    fn decode_suspense(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Suspense(SuspenseEvent {
            slice_index: self.read_u64()?,
            handle: SuspenseHandle::from_raw(self.read_u64()?),
            task: self.read_option_task()?,
            kind: match self.read_u8()? {
                0 => SuspenseEventKind::Registered,
                1 => SuspenseEventKind::Readmitted,
                2 => SuspenseEventKind::Dropped,
                _ => SuspenseEventKind::Aborted,
            },
            timestamp: self.read_time()?,
        }))
    }

    fn decode_commit(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Commit(CommitEvent {
            slice_index: self.read_u64()?,
            root: RootKey(self.read_u64()?),
            task: self.read_task()?,
            generation: Generation(self.read_u64()?),
            lane: self.read_lane()?,
            outcome: self.read_commit_outcome()?,
            entries: self.read_u32()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_fault(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Fault(FaultEvent {
            slice_index: self.read_u64()?,
            task: self.read_task()?,
            root: RootKey(self.read_u64()?),
            boundary: self.read_option_task()?,
            kind: match self.read_u8()? {
                0 => FaultKind::WorkClosure,
                _ => FaultKind::SuspensionTimeout,
            },
            timestamp: self.read_time()?,
        }))
    }

    fn decode_starvation_boost(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::StarvationBoost(StarvationBoostEvent {
            slice_index: self.read_u64()?,
            from: self.read_lane()?,
            to: self.read_lane()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_budget_change(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BudgetChange(BudgetChangeEvent {
            slice_index: self.read_u64()?,
            old: self.read_duration()?,
            new: self.read_duration()?,
            elapsed_ema: self.read_u64()?,
        }))
    }

    fn decode_slice_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SliceSummary(SliceSummary {
            slice_index: self.read_u64()?,
            start: self.read_time()?,
            budget: self.read_duration()?,
            elapsed: self.read_duration()?,
            drain_ticks: self.read_u64()?,
            commit_ticks: self.read_u64()?,
            tasks_run: self.read_u32()?,
            commits: self.read_u32()?,
            rejected: self.read_u32()?,
            outcome: self.read_outcome()?,
        }))
    }

    fn decode_task_start(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TaskStart(TaskStartEvent {
            slice_index: self.read_u64()?,
            task: self.read_task()?,
            lane: self.read_lane()?,
            generation: Generation(self.read_u64()?),
            timestamp: self.read_time()?,
        }))
    }

    fn decode_task_step(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TaskStep(TaskStepEvent {
            slice_index: self.read_u64()?,
            task: self.read_task()?,
            step: match self.read_u8()? {
                0 => StepKind::Done,
                1 => StepKind::Suspend,
                2 => StepKind::Continue,
                _ => StepKind::Fault,
            },
            timestamp: self.read_time()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_SLICE_BEGIN => self.decode_slice_begin(),
            TAG_SLICE_END => self.decode_slice_end(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_DISCARD => self.decode_discard(),
            TAG_SUSPENSE => self.decode_suspense(),
            TAG_COMMIT => self.decode_commit(),
            TAG_FAULT => self.decode_fault(),
            TAG_STARVATION_BOOST => self.decode_starvation_boost(),
            TAG_BUDGET_CHANGE => self.decode_budget_change(),
            TAG_SLICE_SUMMARY => self.decode_slice_summary(),
            TAG_TASK_START => self.decode_task_start(),
            TAG_TASK_STEP => self.decode_task_step(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> SliceSummary {
        SliceSummary {
            slice_index: 7,
            start: HostTime(1_000_000),
            budget: Duration(5_000_000),
            elapsed: Duration(4_200_000),
            drain_ticks: 4_000_000,
            commit_ticks: 150_000,
            tasks_run: 31,
            commits: 2,
            rejected: 1,
            outcome: SliceOutcome::YieldedToHost,
        }
    }

    #[test]
    fn commit_outcome_and_task_ids_survive_recording() {
        let mut rec = RecorderSink::new();
        let task = TaskId::from_raw(12, 3);
        rec.on_commit(&CommitEvent {
            slice_index: 4,
            root: RootKey(9),
            task,
            generation: Generation(5),
            lane: Lane::Transition,
            outcome: CommitOutcome::Rejected(RejectReason::StaleGeneration),
            entries: 0,
            timestamp: HostTime(77),
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::Commit(e) => {
                assert_eq!(e.task, task);
                assert_eq!(e.root, RootKey(9));
                assert_eq!(e.generation, Generation(5));
                assert_eq!(e.lane, Lane::Transition);
                assert_eq!(e.rejected(), Some(RejectReason::StaleGeneration));
            }
            other => panic!("expected Commit, got {other:?}"),
        }
    }

    #[test]
    fn optional_task_fields_decode() {
        let mut rec = RecorderSink::new();
        rec.on_suspense(&SuspenseEvent {
            slice_index: 1,
            handle: SuspenseHandle::from_raw(40),
            task: None,
            kind: SuspenseEventKind::Aborted,
            timestamp: HostTime(10),
        });
        rec.on_fault(&FaultEvent {
            slice_index: 1,
            task: TaskId::from_raw(2, 0),
            root: RootKey(1),
            boundary: Some(TaskId::from_raw(0, 0)),
            kind: FaultKind::SuspensionTimeout,
            timestamp: HostTime(11),
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2);
        match &events[0] {
            RecordedEvent::Suspense(e) => {
                assert_eq!(e.task, None);
                assert_eq!(e.handle, SuspenseHandle::from_raw(40));
                assert_eq!(e.kind, SuspenseEventKind::Aborted);
            }
            other => panic!("expected Suspense, got {other:?}"),
        }
        match &events[1] {
            RecordedEvent::Fault(e) => {
                assert_eq!(e.boundary, Some(TaskId::from_raw(0, 0)));
                assert_eq!(e.kind, FaultKind::SuspensionTimeout);
            }
            other => panic!("expected Fault, got {other:?}"),
        }
    }

    #[test]
    fn slice_summary_keeps_counters() {
        let mut rec = RecorderSink::new();
        let orig = sample_summary();
        rec.on_slice_summary(&orig);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        match &events[..] {
            [RecordedEvent::SliceSummary(s)] => {
                assert_eq!(s.slice_index, orig.slice_index);
                assert_eq!(s.elapsed, orig.elapsed);
                assert_eq!(s.drain_ticks, orig.drain_ticks);
                assert_eq!(s.tasks_run, orig.tasks_run);
                assert_eq!(s.rejected, orig.rejected);
                assert_eq!(s.outcome, orig.outcome);
            }
            other => panic!("expected one SliceSummary, got {other:?}"),
        }
    }

    #[test]
    fn mixed_stream_preserves_order() {
        let mut rec = RecorderSink::new();
        rec.on_slice_begin(&SliceBeginEvent {
            slice_index: 1,
            now: HostTime(0),
            budget: Duration(100),
            queued: 3,
        });
        rec.on_starvation_boost(&StarvationBoostEvent {
            slice_index: 1,
            from: Lane::Immediate,
            to: Lane::Idle,
            timestamp: HostTime(5),
        });
        rec.on_task_step(&TaskStepEvent {
            slice_index: 1,
            task: TaskId::from_raw(0, 0),
            step: StepKind::Continue,
            timestamp: HostTime(6),
        });
        rec.on_slice_summary(&sample_summary());

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], RecordedEvent::SliceBegin(_)));
        assert!(matches!(
            events[1],
            RecordedEvent::StarvationBoost(StarvationBoostEvent {
                from: Lane::Immediate,
                to: Lane::Idle,
                ..
            })
        ));
        assert!(matches!(events[2], RecordedEvent::TaskStep(_)));
        assert!(matches!(events[3], RecordedEvent::SliceSummary(_)));
    }

    #[test]
    fn truncated_record_stops_iteration() {
        let mut rec = RecorderSink::new();
        rec.on_budget_change(&BudgetChangeEvent {
            slice_index: 2,
            old: Duration(10),
            new: Duration(8),
            elapsed_ema: 14,
        });
        let bytes = rec.into_bytes();
        assert_eq!(decode(&bytes).count(), 1);
        assert_eq!(decode(&bytes[..bytes.len() - 1]).count(), 0);
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }
}
