use std::any::Any;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("macrotask panicked: {0}")]
    TaskPanicked(String),

    #[error("event loop still busy after {limit:?} ({pending} macrotasks, {timers} timers left)")]
    StillBusy {
        limit: Duration,
        pending: usize,
        timers: usize,
    },
}

impl HostError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        HostError::TaskPanicked(message)
    }
}
