//! Optional event log of task and scheduler transitions.
//!
//! Every hook is a no-op unless profiling is enabled in the config *and* a
//! caller has started logging.

use crate::priority::Priority;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProfilingEvent {
    TaskStart { id: u64, priority: Priority, time: f64 },
    TaskRun { id: u64, time: f64 },
    TaskYield { id: u64, time: f64 },
    TaskComplete { id: u64, time: f64 },
    TaskCancel { id: u64, time: f64 },
    TaskError { id: u64, time: f64 },
    SchedulerSuspend { time: f64 },
    SchedulerResume { time: f64 },
}

impl ProfilingEvent {
    pub fn time(&self) -> f64 {
        match *self {
            ProfilingEvent::TaskStart { time, .. }
            | ProfilingEvent::TaskRun { time, .. }
            | ProfilingEvent::TaskYield { time, .. }
            | ProfilingEvent::TaskComplete { time, .. }
            | ProfilingEvent::TaskCancel { time, .. }
            | ProfilingEvent::TaskError { time, .. }
            | ProfilingEvent::SchedulerSuspend { time }
            | ProfilingEvent::SchedulerResume { time } => time,
        }
    }

    pub fn task_id(&self) -> Option<u64> {
        match *self {
            ProfilingEvent::TaskStart { id, .. }
            | ProfilingEvent::TaskRun { id, .. }
            | ProfilingEvent::TaskYield { id, .. }
            | ProfilingEvent::TaskComplete { id, .. }
            | ProfilingEvent::TaskCancel { id, .. }
            | ProfilingEvent::TaskError { id, .. } => Some(id),
            ProfilingEvent::SchedulerSuspend { .. } | ProfilingEvent::SchedulerResume { .. } => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Profiler {
    enabled: bool,
    limit: usize,
    log: Option<Vec<ProfilingEvent>>,
}

impl Profiler {
    pub fn new(enabled: bool, limit: usize) -> Self {
        Self {
            enabled,
            limit,
            log: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn start(&mut self) {
        if self.enabled {
            self.log = Some(Vec::new());
        }
    }

    pub fn stop(&mut self) -> Option<Vec<ProfilingEvent>> {
        if !self.enabled {
            return None;
        }
        Some(self.log.take().unwrap_or_default())
    }

    pub fn record(&mut self, event: ProfilingEvent) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        if log.len() >= self.limit {
            tracing::error!(
                "profiling event log exceeded its limit of {} events, stopping",
                self.limit
            );
            self.log = None;
            return;
        }
        log.push(event);
    }
}
