use clap::Args;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tempo_scheduler::{Host, Priority, ProfilingEvent, Scheduler, ScheduleOptions, Status};

/// A synthetic batch of tasks.
///
/// Task `i` gets the `i`-th priority in round-robin order and is split into
/// `chunks` pieces of `chunk_ms` each. It checks `should_yield` between pieces
/// and returns a continuation when told to.
#[derive(Debug, Clone, Args)]
pub struct Workload {
    /// Number of tasks to schedule
    #[arg(long, default_value_t = 20)]
    pub tasks: u32,

    /// Pieces of work per task
    #[arg(long, default_value_t = 8)]
    pub chunks: u32,

    /// Cost of one piece, in milliseconds
    #[arg(long, default_value_t = 4.0)]
    pub chunk_ms: f64,

    /// Delay every n-th task (0 disables)
    #[arg(long, default_value_t = 0)]
    pub delay_every: u32,

    /// Delay applied to delayed tasks, in milliseconds
    #[arg(long, default_value_t = 100.0)]
    pub delay_ms: f64,

    /// Cancel every n-th task right after scheduling it (0 disables)
    #[arg(long, default_value_t = 0)]
    pub cancel_every: u32,

    /// Force a frame rate (0 restores the configured frame budget)
    #[arg(long)]
    pub fps: Option<f64>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Counters {
    pub completed: u32,
    pub cancelled: u32,
    pub invocations: u32,
    pub timed_out: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub host: &'static str,
    pub tasks: u32,
    #[serde(flatten)]
    pub counters: Counters,
    /// Host activations; each is one slice of scheduler work.
    pub slices: u64,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<ProfilingEvent>>,
}

/// Spends `ms` of host time.
pub type Burn = Rc<dyn Fn(f64)>;

type Shared = Rc<RefCell<Counters>>;

impl Workload {
    /// Puts every task on `scheduler`. Nothing runs until the host is pumped.
    pub fn submit<H: Host>(&self, scheduler: &Scheduler<H>, burn: Burn) -> Shared {
        if let Some(fps) = self.fps {
            scheduler.force_frame_rate(fps);
        }

        let counters = Shared::default();
        for i in 0..self.tasks {
            let priority = Priority::ALL[i as usize % Priority::ALL.len()];
            let options = if self.delay_every > 0 && i % self.delay_every == 0 {
                ScheduleOptions::delayed(self.delay_ms)
            } else {
                ScheduleOptions::default()
            };

            let piece = Piece {
                scheduler: scheduler.clone(),
                burn: burn.clone(),
                counters: counters.clone(),
                remaining: self.chunks,
                chunk_ms: self.chunk_ms,
            };
            let handle =
                scheduler.schedule_callback_with(priority, move |did_timeout| piece.run(did_timeout), options);

            if self.cancel_every > 0 && i % self.cancel_every == self.cancel_every - 1 {
                scheduler.cancel_callback(&handle);
                counters.borrow_mut().cancelled += 1;
            }
        }
        tracing::info!(tasks = self.tasks, "workload submitted");
        counters
    }
}

struct Piece<H: Host> {
    scheduler: Scheduler<H>,
    burn: Burn,
    counters: Shared,
    remaining: u32,
    chunk_ms: f64,
}

impl<H: Host> Piece<H> {
    fn run(mut self, did_timeout: bool) -> Status {
        {
            let mut counters = self.counters.borrow_mut();
            counters.invocations += 1;
            if did_timeout {
                counters.timed_out += 1;
            }
        }

        while self.remaining > 0 {
            (self.burn)(self.chunk_ms);
            self.remaining -= 1;
            if self.scheduler.should_yield() {
                break;
            }
        }

        if self.remaining == 0 {
            self.counters.borrow_mut().completed += 1;
            Status::Done
        } else {
            Status::continue_with(move |did_timeout| self.run(did_timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_scheduler::VirtualHost;

    fn workload() -> Workload {
        Workload {
            tasks: 10,
            chunks: 4,
            chunk_ms: 5.0,
            delay_every: 0,
            delay_ms: 100.0,
            cancel_every: 0,
            fps: None,
        }
    }

    fn drive(workload: &Workload) -> (VirtualHost, Counters) {
        let host = VirtualHost::new();
        let scheduler = Scheduler::new(host.clone());
        let clock = host.clone();
        let counters = workload.submit(&scheduler, Rc::new(move |ms| clock.advance_time(ms)));
        host.run_all();
        let counters = counters.borrow().clone();
        (host, counters)
    }

    #[test]
    fn test_every_task_completes() {
        let (host, counters) = drive(&workload());
        assert_eq!(counters.completed, 10);
        assert_eq!(counters.cancelled, 0);
        // 20ms of work per task never fits a single 16ms frame.
        assert!(counters.invocations > 10);
        assert_eq!(host.now(), 200.0);
    }

    #[test]
    fn test_cancelled_tasks_never_run() {
        let mut workload = workload();
        workload.cancel_every = 2;
        let (_, counters) = drive(&workload);
        assert_eq!(counters.cancelled, 5);
        assert_eq!(counters.completed, 5);
    }

    #[test]
    fn test_delayed_tasks_wait() {
        let mut workload = workload();
        workload.tasks = 1;
        workload.delay_every = 1;
        let (host, counters) = drive(&workload);
        assert_eq!(counters.completed, 1);
        assert_eq!(host.now(), 120.0);
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = Report {
            host: "virtual",
            tasks: 1,
            counters: Counters::default(),
            slices: 2,
            elapsed_ms: 3.0,
            events: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["completed"], 0);
        assert_eq!(json["slices"], 2);
        assert!(json.get("events").is_none());
    }
}
