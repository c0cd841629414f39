//! A host with a virtual clock, driven by hand.
//!
//! Nothing runs until the owner pumps it: deferred callbacks wait for
//! [`VirtualHost::run_next`] or [`VirtualHost::run_until_idle`], timeouts wait
//! for the clock to be advanced. Useful for tests and simulations that need
//! exact control over time.

use crate::{Host, InputKind, TimeoutId};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

struct VirtualTimer {
    id: TimeoutId,
    deadline: f64,
    task: Box<dyn FnOnce()>,
}

#[derive(Debug, Default, Clone, Copy)]
struct InputState {
    discrete: bool,
    continuous: bool,
}

#[derive(Default)]
struct VirtualState {
    now: f64,
    deferred: VecDeque<Box<dyn FnOnce()>>,
    timers: Vec<VirtualTimer>,
    next_timeout: u64,
    input: Option<InputState>,
    deferred_runs: u64,
}

#[derive(Clone, Default)]
pub struct VirtualHost {
    state: Rc<RefCell<VirtualState>>,
}

impl VirtualHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: f64) -> Self {
        let host = Self::default();
        host.state.borrow_mut().now = now;
        host
    }

    /// Moves the clock forward without firing timers. Safe to call from inside
    /// a running task to simulate the task taking time.
    pub fn advance_time(&self, ms: f64) {
        self.state.borrow_mut().now += ms;
    }

    /// Moves the clock forward and fires every timer that came due, in
    /// deadline order. Returns how many fired.
    pub fn advance(&self, ms: f64) -> usize {
        self.advance_time(ms);
        self.fire_due_timers()
    }

    pub fn fire_due_timers(&self) -> usize {
        let mut fired = 0;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let now = state.now;
                let due = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.deadline <= now)
                    .min_by(|(_, a), (_, b)| {
                        a.deadline.total_cmp(&b.deadline).then(a.id.cmp(&b.id))
                    })
                    .map(|(index, _)| index);
                due.map(|index| state.timers.remove(index))
            };
            let Some(timer) = next else {
                return fired;
            };
            (timer.task)();
            fired += 1;
        }
    }

    /// Runs the oldest deferred callback. Returns `false` if there was none.
    pub fn run_next(&self) -> bool {
        let task = {
            let mut state = self.state.borrow_mut();
            let task = state.deferred.pop_front();
            if task.is_some() {
                state.deferred_runs += 1;
            }
            task
        };
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs deferred callbacks until none are left. Timers are not fired.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Drains deferred callbacks, then jumps the clock to the next timer and
    /// repeats until nothing is pending at all.
    pub fn run_all(&self) -> usize {
        let mut ran = self.run_until_idle();
        while let Some(deadline) = self.next_timeout_deadline() {
            {
                let mut state = self.state.borrow_mut();
                if deadline > state.now {
                    state.now = deadline;
                }
            }
            ran += self.fire_due_timers();
            ran += self.run_until_idle();
        }
        ran
    }

    pub fn pending_deferred(&self) -> usize {
        self.state.borrow().deferred.len()
    }

    pub fn pending_timeouts(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn next_timeout_deadline(&self) -> Option<f64> {
        self.state
            .borrow()
            .timers
            .iter()
            .map(|timer| timer.deadline)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Total deferred callbacks run so far; one per scheduler slice.
    pub fn deferred_runs(&self) -> u64 {
        self.state.borrow().deferred_runs
    }

    /// Makes `is_input_pending` answer, starting with no pending input.
    pub fn enable_input_pending(&self) {
        self.state.borrow_mut().input = Some(InputState::default());
    }

    pub fn set_input_pending(&self, discrete: bool, continuous: bool) {
        self.state.borrow_mut().input = Some(InputState {
            discrete,
            continuous,
        });
    }

    pub fn disable_input_pending(&self) {
        self.state.borrow_mut().input = None;
    }
}

impl Host for VirtualHost {
    fn now(&self) -> f64 {
        self.state.borrow().now
    }

    fn schedule_deferred(&self, task: Box<dyn FnOnce()>) {
        self.state.borrow_mut().deferred.push_back(task);
    }

    fn set_timeout(&self, task: Box<dyn FnOnce()>, delay_ms: f64) -> TimeoutId {
        let mut state = self.state.borrow_mut();
        state.next_timeout += 1;
        let id = TimeoutId(state.next_timeout);
        let deadline = state.now + delay_ms.max(0.0);
        state.timers.push(VirtualTimer { id, deadline, task });
        id
    }

    fn clear_timeout(&self, id: TimeoutId) {
        self.state.borrow_mut().timers.retain(|timer| timer.id != id);
    }

    fn is_input_pending(&self, kind: InputKind) -> Option<bool> {
        let input = self.state.borrow().input?;
        Some(match kind {
            InputKind::Discrete => input.discrete,
            InputKind::IncludeContinuous => input.discrete || input.continuous,
        })
    }
}
