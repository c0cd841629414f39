//! Glue between the work loop and the host's event loop.
//!
//! Each slice is one deferred host callback. When a slice ends with work left
//! over, the next deferred callback is armed before control returns to the
//! host, so the host gets to paint and handle input in between.

use crate::scheduler::Scheduler;
use crate::Host;
use std::rc::Rc;

impl<H: Host> Scheduler<H> {
    pub(crate) fn request_host_callback(&self) {
        let arm = {
            let mut state = self.inner.state.borrow_mut();
            state.has_scheduled_host_callback = true;
            if state.is_message_loop_running {
                false
            } else {
                state.is_message_loop_running = true;
                true
            }
        };
        if arm {
            self.schedule_perform_work_until_deadline();
        }
    }

    fn schedule_perform_work_until_deadline(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.inner.host.schedule_deferred(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                Scheduler::from_inner(inner).perform_work_until_deadline();
            }
        }));
    }

    fn perform_work_until_deadline(&self) {
        let start = {
            let mut state = self.inner.state.borrow_mut();
            if state.has_scheduled_host_callback {
                // Measure how long the host's thread stays blocked from here.
                let current_time = self.inner.host.now();
                state.slice_start = current_time;
                Some(current_time)
            } else {
                state.is_message_loop_running = false;
                state.needs_paint = false;
                None
            }
        };
        let Some(current_time) = start else {
            return;
        };

        let mut activation = Activation {
            scheduler: self,
            has_more_work: None,
        };
        activation.has_more_work = Some(self.flush_work(true, current_time));
    }

    /// Arms the single host timeout slot, replacing any outstanding timeout.
    pub(crate) fn request_host_timeout(&self, delay_ms: f64) {
        self.cancel_host_timeout();

        let weak = Rc::downgrade(&self.inner);
        let id = self.inner.host.set_timeout(
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let scheduler = Scheduler::from_inner(inner);
                    let now = scheduler.now();
                    scheduler.handle_timeout(now);
                }
            }),
            delay_ms,
        );
        tracing::debug!(timeout = id.0, delay_ms, "armed host timeout");
        self.inner.state.borrow_mut().timeout_id = Some(id);
    }

    pub(crate) fn cancel_host_timeout(&self) {
        let previous = self.inner.state.borrow_mut().timeout_id.take();
        if let Some(id) = previous {
            self.inner.host.clear_timeout(id);
        }
    }
}

/// Decides what follows an activation once the flush is over.
///
/// `has_more_work` stays `None` when the flush unwound; the ready queue then
/// decides whether another activation is needed.
struct Activation<'a, H: Host> {
    scheduler: &'a Scheduler<H>,
    has_more_work: Option<bool>,
}

impl<H: Host> Drop for Activation<'_, H> {
    fn drop(&mut self) {
        let inner = &self.scheduler.inner;
        let Ok(mut state) = inner.state.try_borrow_mut() else {
            return;
        };
        let (has_more_work, pending_timer) = match self.has_more_work {
            Some(more) => (more, None),
            None => {
                let ready = state.queues.peek_ready().is_some();
                let timer = if ready || state.timeout_id.is_some() {
                    None
                } else {
                    state.queues.first_timer_start()
                };
                (ready, timer)
            }
        };

        if !has_more_work {
            state.is_message_loop_running = false;
            state.has_scheduled_host_callback = false;
        }
        // Yielding gives the host a chance to paint.
        state.needs_paint = false;
        drop(state);

        if has_more_work {
            self.scheduler.schedule_perform_work_until_deadline();
        } else if let Some(start_time) = pending_timer {
            let now = self.scheduler.now();
            self.scheduler.request_host_timeout(start_time - now);
        }
    }
}
