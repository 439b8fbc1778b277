// Copyright 2026 the Ripple Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use ripple_core::error::WorkFault;
use ripple_core::suspense::SuspenseHandle;
use ripple_core::work::{Checkpoint, Step, Work};

use crate::host::ManualClock;

/// Shared record of which scripted tasks ran, in order.
#[derive(Clone, Debug, Default)]
pub struct ExecLog(Rc<RefCell<Vec<u64>>>);

impl ExecLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels of every step run so far.
    #[must_use]
    pub fn entries(&self) -> Vec<u64> {
        self.0.borrow().clone()
    }

    /// Position of the first step carrying `label`.
    #[must_use]
    pub fn position(&self, label: u64) -> Option<usize> {
        self.0.borrow().iter().position(|&l| l == label)
    }

    fn push(&self, label: u64) {
        self.0.borrow_mut().push(label);
    }
}

/// Receives a handle created by a script, so the test can resolve it.
#[derive(Clone, Debug, Default)]
pub struct HandleSlot(Rc<Cell<Option<SuspenseHandle>>>);

impl HandleSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle, once the script has created it.
    #[must_use]
    pub fn get(&self) -> Option<SuspenseHandle> {
        self.0.get()
    }
}

/// One scripted action.
#[derive(Clone, Debug)]
pub enum Action<O> {
    /// Advance the script's clock.
    Spend(u64),
    /// Yield with `Step::Continue`.
    Continue,
    /// Suspend on an existing handle.
    Suspend(SuspenseHandle),
    /// Create a handle, store it in the slot, and suspend on it.
    SuspendNew(HandleSlot),
    /// Finish with an output.
    Done(O),
    /// Fail with a message.
    Fail(&'static str),
}

/// Work that plays back a fixed list of [`Action`]s.
///
/// Each step runs actions until one of them ends the step. `Spend` needs a
/// clock (see [`Script::on_clock`]); without one it is ignored. A script that
/// runs out of actions faults.
#[derive(Clone, Debug)]
pub struct Script<O> {
    actions: VecDeque<Action<O>>,
    clock: Option<ManualClock>,
    log: Option<(ExecLog, u64)>,
}

impl<O> Default for Script<O> {
    fn default() -> Self {
        Self {
            actions: VecDeque::new(),
            clock: None,
            log: None,
        }
    }
}

impl<O> Script<O> {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A script that finishes immediately with `output`.
    #[must_use]
    pub fn done(output: O) -> Self {
        Self::new().then(Action::Done(output))
    }

    /// Spends time on `clock`.
    #[must_use]
    pub fn on_clock(mut self, clock: &ManualClock) -> Self {
        self.clock = Some(clock.clone());
        self
    }

    /// Records `label` in `log` at the start of every step.
    #[must_use]
    pub fn logged(mut self, log: &ExecLog, label: u64) -> Self {
        self.log = Some((log.clone(), label));
        self
    }

    /// Appends an action.
    #[must_use]
    pub fn then(mut self, action: Action<O>) -> Self {
        self.actions.push_back(action);
        self
    }

    /// Appends `Spend(ticks)`.
    #[must_use]
    pub fn spend(self, ticks: u64) -> Self {
        self.then(Action::Spend(ticks))
    }

    /// Appends `Continue`.
    #[must_use]
    pub fn cont(self) -> Self {
        self.then(Action::Continue)
    }

    /// Appends `SuspendNew(slot)`.
    #[must_use]
    pub fn suspend_new(self, slot: &HandleSlot) -> Self {
        self.then(Action::SuspendNew(slot.clone()))
    }

    /// Appends `Done(output)`.
    #[must_use]
    pub fn finish(self, output: O) -> Self {
        self.then(Action::Done(output))
    }

    /// Appends `Fail(message)`.
    #[must_use]
    pub fn fail(self, message: &'static str) -> Self {
        self.then(Action::Fail(message))
    }
}

impl<O> Work<O> for Script<O> {
    fn step(&mut self, cx: &mut Checkpoint<'_>) -> Result<Step<O>, WorkFault> {
        if let Some((log, label)) = &self.log {
            log.push(*label);
        }
        while let Some(action) = self.actions.pop_front() {
            match action {
                Action::Spend(ticks) => {
                    if let Some(clock) = &self.clock {
                        clock.advance(ticks);
                    }
                }
                Action::Continue => return Ok(Step::Continue),
                Action::Suspend(handle) => return Ok(Step::Suspend(handle)),
                Action::SuspendNew(slot) => {
                    let handle = cx.create_handle();
                    slot.0.set(Some(handle));
                    return Ok(Step::Suspend(handle));
                }
                Action::Done(output) => return Ok(Step::Done(output)),
                Action::Fail(message) => return Err(WorkFault::new(message)),
            }
        }
        Err(WorkFault::new("script exhausted"))
    }
}
