//! Native host for `tempo-scheduler`.
//!
//! [`EventLoopHost`] is a small single-threaded event loop: a macrotask
//! queue, a timer heap on [`std::time::Instant`] and an optional input probe.
//! The owning thread drives it with [`EventLoopHost::turn`] or one of the
//! `run_*` methods.

mod error;
mod event_loop;

pub use error::HostError;
pub use event_loop::{EventLoopHost, MAX_TIMEOUT_MS};

use tempo_scheduler::{Scheduler, SchedulerConfig, SchedulerError};

/// A scheduler wired to a fresh event loop. Returns both so the caller can
/// drive the loop.
pub fn scheduler(
    config: SchedulerConfig,
) -> Result<(EventLoopHost, Scheduler<EventLoopHost>), SchedulerError> {
    let host = EventLoopHost::new();
    let scheduler = Scheduler::with_config(host.clone(), config)?;
    Ok((host, scheduler))
}
