use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error(
        "force_frame_rate takes a positive number between 0 and 125, got {0}; \
         forcing frame rates higher than 125 fps is not supported"
    )]
    InvalidFrameRate(f64),

    #[error("invalid scheduler config: `{field}` {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("unknown priority level {0}")]
    UnknownPriority(i64),

    #[error("unknown priority name `{0}`")]
    UnknownPriorityName(String),
}
