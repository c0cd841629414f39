use crate::priority::Priority;
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Slot of a task record inside the scheduler.
    pub struct TaskKey;
}

/// A unit of work. The argument is `true` when the task's deadline had
/// already passed at the moment it was invoked.
pub type Callback = Box<dyn FnOnce(bool) -> Status>;

/// What a task callback hands back to the work loop.
pub enum Status {
    Done,
    /// The task is not finished; run this next, in the same queue slot.
    Continue(Callback),
}

impl Status {
    pub fn continue_with(f: impl FnOnce(bool) -> Status + 'static) -> Self {
        Status::Continue(Box::new(f))
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Done => f.write_str("Done"),
            Status::Continue(_) => f.write_str("Continue(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScheduleOptions {
    /// Milliseconds before the task becomes eligible. Non-positive means now.
    pub delay: Option<f64>,
}

impl ScheduleOptions {
    pub fn delayed(delay: f64) -> Self {
        Self { delay: Some(delay) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Not yet eligible, keyed by start time.
    Delay,
    /// Eligible, keyed by expiration time.
    Ready,
}

/// Opaque handle returned by `schedule_callback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub(crate) key: TaskKey,
    pub(crate) id: u64,
}

impl TaskHandle {
    /// Creation-order id, unique for the lifetime of a scheduler.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Snapshot of a live task, for introspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskInfo {
    pub id: u64,
    pub priority: Priority,
    pub start_time: f64,
    pub expiration_time: f64,
    pub sort_index: f64,
    pub queue: QueueKind,
    pub cancelled: bool,
}

pub(crate) struct Task {
    pub id: u64,
    pub callback: Option<Callback>,
    pub priority: Priority,
    pub start_time: f64,
    pub expiration_time: f64,
    pub sort_index: f64,
    pub queue: QueueKind,
    pub cancelled: bool,
    /// Sitting in the ready queue as far as profiling is concerned.
    pub is_queued: bool,
}

impl Task {
    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            priority: self.priority,
            start_time: self.start_time,
            expiration_time: self.expiration_time,
            sort_index: self.sort_index,
            queue: self.queue,
            cancelled: self.cancelled,
        }
    }
}
