use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::priority::Priority;
use crate::profiling::{Profiler, ProfilingEvent};
use crate::queue::TaskQueues;
use crate::task::{Callback, QueueKind, ScheduleOptions, Status, TaskHandle, TaskInfo};
use crate::{Host, TimeoutId};
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) struct State {
    pub queues: TaskQueues,
    pub profiler: Profiler,
    pub current_task: Option<TaskHandle>,
    pub current_priority: Priority,
    pub is_paused: bool,
    /// Set while a flush is executing, to prevent re-entrance.
    pub is_performing_work: bool,
    pub is_host_callback_scheduled: bool,
    pub is_message_loop_running: bool,
    pub has_scheduled_host_callback: bool,
    pub timeout_id: Option<TimeoutId>,
    pub frame_interval: f64,
    /// Host time at which the current slice began.
    pub slice_start: f64,
    pub needs_paint: bool,
}

pub(crate) struct Inner<H> {
    pub host: H,
    pub config: SchedulerConfig,
    pub state: RefCell<State>,
}

/// A cooperative scheduler bound to one host.
///
/// Cloning is cheap and every clone drives the same queues, so task callbacks
/// can capture a clone and schedule more work.
pub struct Scheduler<H: Host> {
    pub(crate) inner: Rc<Inner<H>>,
}

impl<H: Host> Clone for Scheduler<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

enum Step {
    Run(TaskHandle, Callback, bool),
    Skip,
}

enum Exit {
    Drained,
    Yielded,
    Paused,
}

impl<H: Host> Scheduler<H> {
    pub fn new(host: H) -> Self {
        Self::build(host, SchedulerConfig::default())
    }

    pub fn with_config(host: H, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self::build(host, config))
    }

    fn build(host: H, config: SchedulerConfig) -> Self {
        let state = State {
            queues: TaskQueues::new(),
            profiler: Profiler::new(config.enable_profiling, config.profiling_event_limit),
            current_task: None,
            current_priority: Priority::Normal,
            is_paused: false,
            is_performing_work: false,
            is_host_callback_scheduled: false,
            is_message_loop_running: false,
            has_scheduled_host_callback: false,
            timeout_id: None,
            frame_interval: config.frame_yield_ms,
            slice_start: -1.0,
            needs_paint: false,
        };
        Self {
            inner: Rc::new(Inner {
                host,
                config,
                state: RefCell::new(state),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<Inner<H>>) -> Self {
        Self { inner }
    }

    pub fn host(&self) -> &H {
        &self.inner.host
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn now(&self) -> f64 {
        self.inner.host.now()
    }

    pub fn schedule_callback(
        &self,
        priority: Priority,
        callback: impl FnOnce(bool) -> Status + 'static,
    ) -> TaskHandle {
        self.schedule_callback_with(priority, callback, ScheduleOptions::default())
    }

    pub fn schedule_callback_with(
        &self,
        priority: Priority,
        callback: impl FnOnce(bool) -> Status + 'static,
        options: ScheduleOptions,
    ) -> TaskHandle {
        let current_time = self.now();
        let start_time = match options.delay {
            Some(delay) if delay > 0.0 => current_time + delay,
            _ => current_time,
        };
        let expiration_time = start_time + priority.timeout();

        if start_time > current_time {
            // This is a delayed task.
            let (handle, arm_timeout) = {
                let mut guard = self.inner.state.borrow_mut();
                let state = &mut *guard;
                let handle = state.queues.insert(
                    Box::new(callback),
                    priority,
                    start_time,
                    expiration_time,
                    QueueKind::Delay,
                );
                // All tasks are delayed, and this is the one with the earliest delay.
                let arm = state.queues.peek_ready().is_none()
                    && state.queues.peek_delayed() == Some(handle);
                (handle, arm)
            };
            tracing::debug!(
                task = handle.id(),
                %priority,
                start_time,
                "scheduled delayed task"
            );
            if arm_timeout {
                self.request_host_timeout(start_time - current_time);
            }
            handle
        } else {
            let (handle, request_callback) = {
                let mut guard = self.inner.state.borrow_mut();
                let state = &mut *guard;
                let handle = state.queues.insert(
                    Box::new(callback),
                    priority,
                    start_time,
                    expiration_time,
                    QueueKind::Ready,
                );
                if state.profiler.is_enabled() {
                    if let Some(task) = state.queues.get_mut(&handle) {
                        task.is_queued = true;
                    }
                    state.profiler.record(ProfilingEvent::TaskStart {
                        id: handle.id(),
                        priority,
                        time: current_time,
                    });
                }
                // If we're already performing work, wait until the next time we yield.
                let request = !state.is_host_callback_scheduled && !state.is_performing_work;
                if request {
                    state.is_host_callback_scheduled = true;
                }
                (handle, request)
            };
            tracing::debug!(
                task = handle.id(),
                %priority,
                expiration_time,
                "scheduled task"
            );
            if request_callback {
                self.request_host_callback();
            }
            handle
        }
    }

    /// Cancels a task that has not finished yet. Idempotent.
    ///
    /// The task keeps its queue slot; the work loop discards it when it gets
    /// there.
    pub fn cancel_callback(&self, handle: &TaskHandle) {
        let now = self.now();
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        let Some(task) = state.queues.get_mut(handle) else {
            return;
        };
        if state.profiler.is_enabled() && task.is_queued {
            state
                .profiler
                .record(ProfilingEvent::TaskCancel { id: task.id, time: now });
            task.is_queued = false;
        }
        task.callback = None;
        task.cancelled = true;
    }

    pub fn pause_execution(&self) {
        self.inner.state.borrow_mut().is_paused = true;
    }

    pub fn continue_execution(&self) {
        let request = {
            let mut state = self.inner.state.borrow_mut();
            state.is_paused = false;
            let request = !state.is_host_callback_scheduled && !state.is_performing_work;
            if request {
                state.is_host_callback_scheduled = true;
            }
            request
        };
        if request {
            self.request_host_callback();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.borrow().is_paused
    }

    /// Head of the ready queue, which may be a cancelled task not yet discarded.
    pub fn first_callback_node(&self) -> Option<TaskHandle> {
        self.inner.state.borrow().queues.peek_ready()
    }

    pub fn task_info(&self, handle: &TaskHandle) -> Option<TaskInfo> {
        self.inner
            .state
            .borrow()
            .queues
            .get(handle)
            .map(|task| task.info())
    }

    pub fn ready_len(&self) -> usize {
        self.inner.state.borrow().queues.ready_len()
    }

    pub fn delayed_len(&self) -> usize {
        self.inner.state.borrow().queues.delayed_len()
    }

    pub fn start_logging_profiling_events(&self) {
        self.inner.state.borrow_mut().profiler.start();
    }

    pub fn stop_logging_profiling_events(&self) -> Option<Vec<ProfilingEvent>> {
        self.inner.state.borrow_mut().profiler.stop()
    }

    pub(crate) fn advance_timers(&self, current_time: f64) {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;
        state.queues.advance_timers(current_time, &mut state.profiler);
    }

    /// Fired by the host timeout armed for the earliest delayed task.
    pub(crate) fn handle_timeout(&self, current_time: f64) {
        enum Next {
            Callback,
            Timeout(f64),
            Nothing,
        }

        let next = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            state.timeout_id = None;
            state.queues.advance_timers(current_time, &mut state.profiler);

            if state.is_host_callback_scheduled {
                Next::Nothing
            } else if state.queues.peek_ready().is_some() {
                state.is_host_callback_scheduled = true;
                Next::Callback
            } else if let Some(start_time) = state.queues.first_timer_start() {
                Next::Timeout(start_time - current_time)
            } else {
                Next::Nothing
            }
        };

        match next {
            Next::Callback => self.request_host_callback(),
            Next::Timeout(delay) => self.request_host_timeout(delay),
            Next::Nothing => {}
        }
    }

    /// Runs one slice of work. Returns whether ready work remains.
    pub(crate) fn flush_work(&self, has_time_remaining: bool, initial_time: f64) -> bool {
        let (previous_priority, stale_timeout) = {
            let mut state = self.inner.state.borrow_mut();
            debug_assert!(!state.is_performing_work, "nested flush");
            state
                .profiler
                .record(ProfilingEvent::SchedulerResume { time: initial_time });
            // We'll need a host callback the next time work is scheduled.
            state.is_host_callback_scheduled = false;
            state.is_performing_work = true;
            (state.current_priority, state.timeout_id.take())
        };
        if let Some(id) = stale_timeout {
            // The flush re-arms a timeout itself if one is still needed.
            self.inner.host.clear_timeout(id);
        }

        let _restore = FlushGuard {
            scheduler: self,
            previous_priority,
        };
        self.work_loop(has_time_remaining, initial_time)
    }

    fn work_loop(&self, has_time_remaining: bool, initial_time: f64) -> bool {
        let mut current_time = initial_time;
        self.advance_timers(current_time);

        let exit = loop {
            let step = {
                let mut guard = self.inner.state.borrow_mut();
                let state = &mut *guard;
                state.current_task = state.queues.peek_ready();
                let Some(handle) = state.current_task else {
                    break Exit::Drained;
                };
                if state.is_paused {
                    break Exit::Paused;
                }
                let Some(task) = state.queues.get(&handle) else {
                    state.queues.pop_ready();
                    continue;
                };
                let expiration_time = task.expiration_time;
                if expiration_time > current_time
                    && (!has_time_remaining || self.should_yield_to_host(state))
                {
                    // This task hasn't expired, and we've reached the deadline.
                    break Exit::Yielded;
                }

                let Some(task) = state.queues.get_mut(&handle) else {
                    continue;
                };
                match task.callback.take() {
                    Some(callback) => {
                        let id = task.id;
                        state.current_priority = task.priority;
                        state
                            .profiler
                            .record(ProfilingEvent::TaskRun { id, time: current_time });
                        Step::Run(handle, callback, expiration_time <= current_time)
                    }
                    None => {
                        state.queues.pop_ready();
                        Step::Skip
                    }
                }
            };

            let Step::Run(handle, callback, did_timeout) = step else {
                continue;
            };
            tracing::trace!(task = handle.id(), did_timeout, "running task");
            let status = callback(did_timeout);
            current_time = self.now();

            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            match status {
                Status::Continue(continuation) => {
                    if let Some(task) = state.queues.get_mut(&handle) {
                        // Reinstalled even if the task cancelled itself meanwhile.
                        task.callback = Some(continuation);
                        state.profiler.record(ProfilingEvent::TaskYield {
                            id: handle.id(),
                            time: current_time,
                        });
                    }
                }
                Status::Done => {
                    if let Some(task) = state.queues.get_mut(&handle) {
                        if task.is_queued {
                            task.is_queued = false;
                            state.profiler.record(ProfilingEvent::TaskComplete {
                                id: handle.id(),
                                time: current_time,
                            });
                        }
                    }
                    if state.queues.peek_ready() == Some(handle) {
                        state.queues.pop_ready();
                    }
                }
            }
            state.queues.advance_timers(current_time, &mut state.profiler);
        };

        match exit {
            Exit::Yielded => {
                tracing::debug!("yielding to host with work remaining");
                true
            }
            Exit::Paused => false,
            Exit::Drained => {
                let first_timer = self.inner.state.borrow().queues.first_timer_start();
                if let Some(start_time) = first_timer {
                    self.request_host_timeout(start_time - current_time);
                }
                false
            }
        }
    }
}

/// Restores the ambient priority and the re-entrancy flag when a flush ends,
/// including when a task callback unwinds.
struct FlushGuard<'a, H: Host> {
    scheduler: &'a Scheduler<H>,
    previous_priority: Priority,
}

impl<H: Host> Drop for FlushGuard<'_, H> {
    fn drop(&mut self) {
        let now = self.scheduler.now();
        let Ok(mut guard) = self.scheduler.inner.state.try_borrow_mut() else {
            return;
        };
        let state = &mut *guard;
        if std::thread::panicking() {
            if let Some(handle) = state.current_task {
                tracing::error!(task = handle.id(), "task callback panicked");
                if let Some(task) = state.queues.get_mut(&handle) {
                    if task.is_queued {
                        task.is_queued = false;
                        state
                            .profiler
                            .record(ProfilingEvent::TaskError { id: handle.id(), time: now });
                    }
                }
                // Its callback is gone; don't leave the node for the next slice.
                if state.queues.peek_ready() == Some(handle) {
                    state.queues.pop_ready();
                }
            }
        }
        state.current_task = None;
        state.current_priority = self.previous_priority;
        state.is_performing_work = false;
        state
            .profiler
            .record(ProfilingEvent::SchedulerSuspend { time: now });
    }
}
