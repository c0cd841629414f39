use crate::error::HostError;
use js_sys::{Function, Object, Reflect};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use tempo_scheduler::{Host, InputKind, TimeoutId};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{MessageChannel, Performance, Window};

type Task = Box<dyn FnOnce()>;

struct PendingTimer {
    handle: Option<i32>,
    task: Task,
}

/// `navigator.scheduling.isInputPending`, when the browser has it.
struct InputPending {
    scheduling: JsValue,
    is_input_pending: Function,
}

impl InputPending {
    fn detect(window: &Window) -> Option<Self> {
        let scheduling = Reflect::get(&window.navigator(), &JsValue::from_str("scheduling")).ok()?;
        if !scheduling.is_object() {
            return None;
        }
        let is_input_pending = Reflect::get(&scheduling, &JsValue::from_str("isInputPending"))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        Some(Self {
            scheduling,
            is_input_pending,
        })
    }

    fn query(&self, kind: InputKind) -> Option<bool> {
        let result = match kind {
            InputKind::Discrete => self.is_input_pending.call0(&self.scheduling),
            InputKind::IncludeContinuous => {
                let options = Object::new();
                Reflect::set(
                    &options,
                    &JsValue::from_str("includeContinuous"),
                    &JsValue::TRUE,
                )
                .ok()?;
                self.is_input_pending.call1(&self.scheduling, &options)
            }
        };
        result.ok()?.as_bool()
    }
}

struct WebInner {
    window: Window,
    performance: Option<Performance>,
    // Fallback clock origin when `performance` is missing.
    epoch: f64,
    channel: MessageChannel,
    pending: RefCell<VecDeque<Task>>,
    timers: RefCell<FxHashMap<TimeoutId, PendingTimer>>,
    next_timeout: Cell<u64>,
    input: Option<InputPending>,
    on_message: Closure<dyn FnMut()>,
    on_timeout: Closure<dyn FnMut(JsValue)>,
}

impl WebInner {
    fn run_next_message(&self) {
        let task = self.pending.borrow_mut().pop_front();
        if let Some(task) = task {
            task();
        }
    }

    fn fire_timer(&self, id: TimeoutId) {
        let timer = self.timers.borrow_mut().remove(&id);
        if let Some(timer) = timer {
            (timer.task)();
        }
    }
}

impl Drop for WebInner {
    fn drop(&mut self) {
        self.channel.port1().set_onmessage(None);
        for timer in self.timers.get_mut().values() {
            if let Some(handle) = timer.handle {
                self.window.clear_timeout_with_handle(handle);
            }
        }
    }
}

/// Browser host: deferred work goes through a `MessageChannel`, timeouts
/// through `setTimeout`, the clock is `performance.now()`.
///
/// A message posted to the channel runs in its own macrotask, after the
/// browser had a chance to paint and dispatch input, and without the
/// minimum delay browsers impose on nested `setTimeout(0)`.
#[derive(Clone)]
pub struct WebHost {
    inner: Rc<WebInner>,
}

impl WebHost {
    pub fn new() -> Result<Self, HostError> {
        let window = web_sys::window().ok_or(HostError::NoWindow)?;
        let channel = MessageChannel::new()?;
        let performance = window.performance();
        let epoch = js_sys::Date::now();
        let input = InputPending::detect(&window);
        if input.is_none() {
            tracing::debug!("navigator.scheduling.isInputPending unavailable");
        }

        let inner = Rc::new_cyclic(|weak: &Weak<WebInner>| {
            let on_message = {
                let weak = weak.clone();
                Closure::<dyn FnMut()>::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.run_next_message();
                    }
                })
            };
            let on_timeout = {
                let weak = weak.clone();
                Closure::<dyn FnMut(JsValue)>::new(move |id: JsValue| {
                    let (Some(inner), Some(id)) = (weak.upgrade(), id.as_f64()) else {
                        return;
                    };
                    inner.fire_timer(TimeoutId(id as u64));
                })
            };
            channel
                .port1()
                .set_onmessage(Some(on_message.as_ref().unchecked_ref()));

            WebInner {
                window,
                performance,
                epoch,
                channel,
                pending: RefCell::new(VecDeque::new()),
                timers: RefCell::new(FxHashMap::default()),
                next_timeout: Cell::new(0),
                input,
                on_message,
                on_timeout,
            }
        });
        Ok(Self { inner })
    }

    pub fn supports_input_pending(&self) -> bool {
        self.inner.input.is_some()
    }

    pub fn pending_messages(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn pending_timeouts(&self) -> usize {
        self.inner.timers.borrow().len()
    }
}

impl Host for WebHost {
    fn now(&self) -> f64 {
        match &self.inner.performance {
            Some(performance) => performance.now(),
            None => js_sys::Date::now() - self.inner.epoch,
        }
    }

    fn schedule_deferred(&self, task: Box<dyn FnOnce()>) {
        self.inner.pending.borrow_mut().push_back(task);
        if let Err(err) = self.inner.channel.port2().post_message(&JsValue::NULL) {
            tracing::error!("{}", HostError::from(err));
        }
    }

    fn set_timeout(&self, task: Box<dyn FnOnce()>, delay_ms: f64) -> TimeoutId {
        let id = TimeoutId(self.inner.next_timeout.get() + 1);
        self.inner.next_timeout.set(id.0);

        let handle = self
            .inner
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_1(
                self.inner.on_timeout.as_ref().unchecked_ref(),
                delay_ms.max(0.0) as i32,
                &JsValue::from_f64(id.0 as f64),
            );
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(timeout = id.0, "setTimeout failed: {}", HostError::from(err));
                None
            }
        };
        self.inner
            .timers
            .borrow_mut()
            .insert(id, PendingTimer { handle, task });
        id
    }

    fn clear_timeout(&self, id: TimeoutId) {
        let timer = self.inner.timers.borrow_mut().remove(&id);
        if let Some(handle) = timer.and_then(|timer| timer.handle) {
            self.inner.window.clear_timeout_with_handle(handle);
        }
    }

    fn is_input_pending(&self, kind: InputKind) -> Option<bool> {
        self.inner.input.as_ref().and_then(|input| input.query(kind))
    }
}
