//! Cooperative, single-threaded task scheduler.
//!
//! Work is submitted with a [`Priority`] and runs in short slices on the
//! host's own event loop. Between slices control goes back to the host so
//! input handling and painting are never starved. A task that needs more
//! time returns [`Status::Continue`] and is resumed in its original slot.
//!
//! ```
//! use tempo_scheduler::{Priority, Scheduler, Status, VirtualHost};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let host = VirtualHost::new();
//! let scheduler = Scheduler::new(host.clone());
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! for name in ["a", "b"] {
//!     let log = log.clone();
//!     scheduler.schedule_callback(Priority::Normal, move |_| {
//!         log.borrow_mut().push(name);
//!         Status::Done
//!     });
//! }
//!
//! host.run_until_idle();
//! assert_eq!(*log.borrow(), vec!["a", "b"]);
//! ```

mod bridge;
pub mod config;
mod context;
pub mod error;
pub mod heap;
pub mod priority;
pub mod profiling;
mod queue;
pub mod scheduler;
pub mod task;
pub mod virtual_host;
mod yielding;

/// Opaque handle for a timeout armed through [`Host::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeoutId(pub u64);

/// Which pending input counts when asking the host whether to yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Clicks, key presses.
    Discrete,
    /// Discrete input plus pointer moves, scrolling and the like.
    IncludeContinuous,
}

/// The services a scheduler needs from the environment it runs in.
///
/// None of these may call back into the scheduler synchronously: deferred
/// callbacks and timeouts run later, from the host's own loop.
pub trait Host: 'static {
    /// Monotonic time in milliseconds.
    fn now(&self) -> f64;

    /// Run `task` once, after the current synchronous execution and before the
    /// host's next paint or idle pass.
    fn schedule_deferred(&self, task: Box<dyn FnOnce()>);

    /// Run `task` once after roughly `delay_ms` milliseconds.
    fn set_timeout(&self, task: Box<dyn FnOnce()>, delay_ms: f64) -> TimeoutId;

    fn clear_timeout(&self, id: TimeoutId);

    /// Whether user input is waiting. `None` when the host cannot tell.
    fn is_input_pending(&self, _kind: InputKind) -> Option<bool> {
        None
    }
}

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use priority::Priority;
pub use profiling::ProfilingEvent;
pub use scheduler::Scheduler;
pub use task::{Callback, QueueKind, ScheduleOptions, Status, TaskHandle, TaskInfo};
pub use virtual_host::VirtualHost;
