use crate::config::frame_interval_for_fps;
use crate::scheduler::{Scheduler, State};
use crate::{Host, InputKind};

impl<H: Host> Scheduler<H> {
    /// Whether the running task should stop and let the host catch up.
    pub fn should_yield(&self) -> bool {
        let state = self.inner.state.borrow();
        self.should_yield_to_host(&state)
    }

    pub(crate) fn should_yield_to_host(&self, state: &State) -> bool {
        let config = &self.inner.config;
        let host = &self.inner.host;
        let time_elapsed = host.now() - state.slice_start;
        if time_elapsed < state.frame_interval {
            // Blocked for less than a single frame. Don't yield yet.
            return false;
        }

        // Blocked long enough that painting or input may be waiting. With an
        // input signal we can yield less often; without one we yield now.
        if config.enable_is_input_pending {
            if state.needs_paint {
                return true;
            }
            if time_elapsed < config.continuous_yield_ms {
                // Only discrete input (clicks, keys) is worth stopping for.
                if let Some(pending) = host.is_input_pending(InputKind::Discrete) {
                    return pending;
                }
            } else if time_elapsed < config.max_yield_ms {
                let kind = if config.enable_is_input_pending_continuous {
                    InputKind::IncludeContinuous
                } else {
                    InputKind::Discrete
                };
                if let Some(pending) = host.is_input_pending(kind) {
                    return pending;
                }
            } else {
                // Blocked for a long time. There may be host work we can't
                // see, like network events.
                return true;
            }
        }

        true
    }

    /// Asks the scheduler to yield at the next opportunity so the host can paint.
    ///
    /// Without an input signal the scheduler yields every frame anyway, so this
    /// only has an effect when input-pending checks are enabled and supported.
    pub fn request_paint(&self) {
        if self.inner.config.enable_is_input_pending
            && self.inner.host.is_input_pending(InputKind::Discrete).is_some()
        {
            self.inner.state.borrow_mut().needs_paint = true;
        }
    }

    /// Overrides the frame interval. `0` restores the configured default.
    ///
    /// Out-of-range rates are logged and ignored.
    pub fn force_frame_rate(&self, fps: f64) {
        match frame_interval_for_fps(fps) {
            Ok(Some(interval)) => {
                tracing::debug!(fps, interval, "forcing frame rate");
                self.inner.state.borrow_mut().frame_interval = interval;
            }
            Ok(None) => {
                self.inner.state.borrow_mut().frame_interval = self.inner.config.frame_yield_ms;
            }
            Err(err) => tracing::error!("{}", err),
        }
    }

    pub fn frame_interval(&self) -> f64 {
        self.inner.state.borrow().frame_interval
    }
}
