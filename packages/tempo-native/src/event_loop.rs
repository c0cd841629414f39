use crate::error::HostError;
use rustc_hash::FxHashMap;
use slab::Slab;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tempo_scheduler::{Host, InputKind, TimeoutId};

/// Longest delay a timer accepts; longer requests are clamped.
pub const MAX_TIMEOUT_MS: f64 = 2_147_483_647.0;

type Task = Box<dyn FnOnce()>;
type InputProbe = Box<dyn Fn(InputKind) -> bool>;

struct Timer {
    id: TimeoutId,
    task: Task,
}

#[derive(Default)]
struct LoopState {
    macrotasks: VecDeque<Task>,
    timers: Slab<Timer>,
    // Cleared timers leave their entry here; it is skipped when it surfaces.
    deadlines: BinaryHeap<Reverse<(Instant, TimeoutId, usize)>>,
    by_id: FxHashMap<TimeoutId, usize>,
    next_timeout: u64,
    input_probe: Option<InputProbe>,
    errors: SmallVec<[HostError; 2]>,
    turns: u64,
}

impl LoopState {
    fn is_live(&self, id: TimeoutId, key: usize) -> bool {
        self.timers.get(key).is_some_and(|timer| timer.id == id)
    }

    fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(&Reverse((deadline, id, key))) = self.deadlines.peek() {
            if self.is_live(id, key) {
                return Some(deadline);
            }
            self.deadlines.pop();
        }
        None
    }
}

/// A single-threaded event loop on the OS monotonic clock.
///
/// Deferred callbacks are macrotasks run in FIFO order, one per [`turn`].
/// Timers that come due join the back of the macrotask queue in deadline
/// order. A panicking macrotask is caught, logged and kept in
/// [`take_errors`]; the loop carries on with the next one.
///
/// [`turn`]: EventLoopHost::turn
/// [`take_errors`]: EventLoopHost::take_errors
#[derive(Clone)]
pub struct EventLoopHost {
    epoch: Instant,
    state: Rc<RefCell<LoopState>>,
}

impl Default for EventLoopHost {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoopHost {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            state: Rc::default(),
        }
    }

    /// Installs the function answering `is_input_pending`. It must not touch
    /// the host.
    pub fn set_input_probe(&self, probe: impl Fn(InputKind) -> bool + 'static) {
        self.state.borrow_mut().input_probe = Some(Box::new(probe));
    }

    pub fn clear_input_probe(&self) {
        self.state.borrow_mut().input_probe = None;
    }

    pub fn pending_macrotasks(&self) -> usize {
        self.state.borrow().macrotasks.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn is_idle(&self) -> bool {
        let mut state = self.state.borrow_mut();
        state.macrotasks.is_empty() && state.next_deadline().is_none()
    }

    /// Macrotasks run so far.
    pub fn turns(&self) -> u64 {
        self.state.borrow().turns
    }

    /// Drains the panics caught since the last call.
    pub fn take_errors(&self) -> SmallVec<[HostError; 2]> {
        std::mem::take(&mut self.state.borrow_mut().errors)
    }

    fn promote_due_timers(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        let mut promoted = 0;
        while let Some(&Reverse((deadline, id, key))) = state.deadlines.peek() {
            if deadline > now {
                break;
            }
            state.deadlines.pop();
            if !state.is_live(id, key) {
                continue;
            }
            let timer = state.timers.remove(key);
            state.by_id.remove(&id);
            state.macrotasks.push_back(timer.task);
            promoted += 1;
        }
        if promoted > 0 {
            tracing::trace!(promoted, "timers fired");
        }
        promoted
    }

    /// Runs at most one macrotask. Returns whether one ran.
    pub fn turn(&self) -> bool {
        self.promote_due_timers();
        let task = self.state.borrow_mut().macrotasks.pop_front();
        let Some(task) = task else {
            return false;
        };
        self.state.borrow_mut().turns += 1;

        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            let error = HostError::from_panic(payload);
            tracing::error!("{}", error);
            self.state.borrow_mut().errors.push(error);
        }
        true
    }

    /// Runs until neither macrotasks nor timers remain, sleeping through the
    /// gaps between timers. Returns how many macrotasks ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            if self.turn() {
                ran += 1;
                continue;
            }
            let next = self.state.borrow_mut().next_deadline();
            match next {
                Some(deadline) => sleep_until(deadline),
                None => return ran,
            }
        }
    }

    /// Like [`run_until_idle`](Self::run_until_idle), but gives up once
    /// `limit` has passed.
    pub fn run_for(&self, limit: Duration) -> Result<usize, HostError> {
        let stop = Instant::now() + limit;
        let mut ran = 0;
        while Instant::now() < stop {
            if self.turn() {
                ran += 1;
                continue;
            }
            let next = self.state.borrow_mut().next_deadline();
            match next {
                Some(deadline) => sleep_until(deadline.min(stop)),
                None => return Ok(ran),
            }
        }

        if self.is_idle() {
            return Ok(ran);
        }
        let state = self.state.borrow();
        Err(HostError::StillBusy {
            limit,
            pending: state.macrotasks.len(),
            timers: state.timers.len(),
        })
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        std::thread::sleep(deadline - now);
    }
}

fn clamp_delay(delay_ms: f64) -> Duration {
    let ms = if delay_ms.is_nan() {
        0.0
    } else {
        delay_ms.clamp(0.0, MAX_TIMEOUT_MS)
    };
    Duration::from_secs_f64(ms / 1000.0)
}

impl Host for EventLoopHost {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn schedule_deferred(&self, task: Box<dyn FnOnce()>) {
        self.state.borrow_mut().macrotasks.push_back(task);
    }

    fn set_timeout(&self, task: Box<dyn FnOnce()>, delay_ms: f64) -> TimeoutId {
        let deadline = Instant::now() + clamp_delay(delay_ms);
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.next_timeout += 1;
        let id = TimeoutId(state.next_timeout);
        let key = state.timers.insert(Timer { id, task });
        state.by_id.insert(id, key);
        state.deadlines.push(Reverse((deadline, id, key)));
        tracing::trace!(timeout = id.0, delay_ms, "timer set");
        id
    }

    fn clear_timeout(&self, id: TimeoutId) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if let Some(key) = state.by_id.remove(&id) {
            if state.timers.contains(key) {
                state.timers.remove(key);
            }
        }
    }

    fn is_input_pending(&self, kind: InputKind) -> Option<bool> {
        self.state
            .borrow()
            .input_probe
            .as_ref()
            .map(|probe| probe(kind))
    }
}
