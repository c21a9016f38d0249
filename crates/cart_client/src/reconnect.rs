//! Delay schedule between push-channel reconnect attempts.
//!
//! `Fixed` (the default) waits the same delay after every close, forever.
//! `Exponential` doubles the delay from `initial` up to `max` with ±50% jitter and
//! starts over after a successful connect. Either may stop after `max_attempts`
//! consecutive attempts that did not yield a connection. Delays below
//! `MIN_RECONNECT_DELAY` are raised to it.

use std::time::Duration;

use backoff::{backoff::Backoff, backoff::Constant, ExponentialBackoff};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);

const EXPONENTIAL_MULTIPLIER: f64 = 2.0;
const EXPONENTIAL_JITTER: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    Fixed {
        delay: Duration,
        max_attempts: Option<u32>,
    },
    Exponential {
        initial: Duration,
        max: Duration,
        max_attempts: Option<u32>,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed {
            delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn max_attempts(&self) -> Option<u32> {
        match self {
            Self::Fixed { max_attempts, .. } | Self::Exponential { max_attempts, .. } => {
                *max_attempts
            }
        }
    }

    /// Whether another reconnect may be scheduled after `attempt` consecutive
    /// closes or failed connects.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts().map_or(true, |max| attempt <= max)
    }

    pub(crate) fn backoff(&self) -> Box<dyn Backoff + Send> {
        match self {
            Self::Fixed { delay, .. } => Box::new(Constant::new((*delay).max(MIN_RECONNECT_DELAY))),
            Self::Exponential { initial, max, .. } => {
                let initial = (*initial).max(MIN_RECONNECT_DELAY);
                Box::new(ExponentialBackoff {
                    current_interval: initial,
                    initial_interval: initial,
                    max_interval: (*max).max(initial),
                    multiplier: EXPONENTIAL_MULTIPLIER,
                    randomization_factor: EXPONENTIAL_JITTER,
                    max_elapsed_time: None,
                    ..Default::default()
                })
            }
        }
    }
}
