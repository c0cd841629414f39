use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Max 31 bit integer, the largest small integer on 32-bit JS engines.
pub const MAX_SIGNED_31_BIT_INT: f64 = 1_073_741_823.0;

pub const IMMEDIATE_PRIORITY_TIMEOUT: f64 = -1.0;
pub const USER_BLOCKING_PRIORITY_TIMEOUT: f64 = 250.0;
pub const NORMAL_PRIORITY_TIMEOUT: f64 = 5000.0;
pub const LOW_PRIORITY_TIMEOUT: f64 = 10000.0;
// Never times out
pub const IDLE_PRIORITY_TIMEOUT: f64 = MAX_SIGNED_31_BIT_INT;

/// Closed set of priority levels, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Immediate = 1,
    UserBlocking = 2,
    #[default]
    Normal = 3,
    Low = 4,
    Idle = 5,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Immediate,
        Priority::UserBlocking,
        Priority::Normal,
        Priority::Low,
        Priority::Idle,
    ];

    /// Time added to a task's start time to get its expiration time.
    pub fn timeout(self) -> f64 {
        match self {
            Priority::Immediate => IMMEDIATE_PRIORITY_TIMEOUT,
            Priority::UserBlocking => USER_BLOCKING_PRIORITY_TIMEOUT,
            Priority::Normal => NORMAL_PRIORITY_TIMEOUT,
            Priority::Low => LOW_PRIORITY_TIMEOUT,
            Priority::Idle => IDLE_PRIORITY_TIMEOUT,
        }
    }

    /// Converts a raw level, falling back to `Normal` for anything outside the set.
    pub fn from_raw(level: i64) -> Self {
        Self::try_from(level).unwrap_or_else(|_| {
            tracing::debug!("unknown priority level {}, using normal", level);
            Priority::Normal
        })
    }

    pub fn as_raw(self) -> i64 {
        self as i64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Immediate => "immediate",
            Priority::UserBlocking => "user-blocking",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Idle => "idle",
        }
    }
}

impl TryFrom<i64> for Priority {
    type Error = SchedulerError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(Priority::Immediate),
            2 => Ok(Priority::UserBlocking),
            3 => Ok(Priority::Normal),
            4 => Ok(Priority::Low),
            5 => Ok(Priority::Idle),
            other => Err(SchedulerError::UnknownPriority(other)),
        }
    }
}

impl FromStr for Priority {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SchedulerError::UnknownPriorityName(s.to_string()))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts() {
        assert_eq!(Priority::Immediate.timeout(), -1.0);
        assert_eq!(Priority::UserBlocking.timeout(), 250.0);
        assert_eq!(Priority::Normal.timeout(), 5000.0);
        assert_eq!(Priority::Low.timeout(), 10000.0);
        assert_eq!(Priority::Idle.timeout(), 1_073_741_823.0);
    }

    #[test]
    fn test_raw_levels_round_trip_and_normalize() {
        for p in Priority::ALL {
            assert_eq!(Priority::from_raw(p.as_raw()), p);
        }
        assert_eq!(Priority::from_raw(0), Priority::Normal);
        assert_eq!(Priority::from_raw(42), Priority::Normal);
        assert!(matches!(
            Priority::try_from(9i64),
            Err(SchedulerError::UnknownPriority(9))
        ));
    }

    #[test]
    fn test_ordering_is_most_urgent_first() {
        assert!(Priority::Immediate < Priority::UserBlocking);
        assert!(Priority::Normal < Priority::Idle);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("user-blocking".parse::<Priority>().ok(), Some(Priority::UserBlocking));
        assert_eq!("IDLE".parse::<Priority>().ok(), Some(Priority::Idle));
        assert!("urgent".parse::<Priority>().is_err());
    }
}
