use thiserror::Error;

/// Errors that can occur while building a stimulus protocol.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ProtocolError {
    #[error("event level must be non-zero")]
    ZeroLevel,

    #[error("event start must be finite, got {0}")]
    NonFiniteStart(f64),

    #[error("event duration must be non-negative and finite, got {0}")]
    InvalidDuration(f64),

    #[error("event period must be non-negative and finite, got {0}")]
    InvalidPeriod(f64),

    #[error("a multiplier requires a period, got multiplier {0} with period 0")]
    MultiplierWithoutPeriod(u32),

    #[error("two events share the start time {0}")]
    SimultaneousEvent(f64),
}

/// Errors that can occur while operating an event-based pacing system.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PacingError {
    #[error("pacing system has not been populated")]
    Unpopulated,

    #[error("pacing system is already populated")]
    AlreadyPopulated,

    #[error("pacing time cannot decrease from {from} to {to}")]
    NegativeTimeIncrement { from: f64, to: f64 },

    #[error("two events fire at the same time {0}")]
    SimultaneousEvent(f64),

    #[error("interrupted while advancing pacing")]
    Interrupted,
}

/// Errors that can occur while building a time-series pacing system.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum TimeSeriesError {
    #[error("times and values must have equal length, got {times} and {values}")]
    SizeMismatch { times: usize, values: usize },

    #[error("a time series needs at least two points, got {0}")]
    NotEnoughData(usize),

    #[error("time at index {0} is not finite")]
    NonFiniteTime(usize),

    #[error("time at index {0} decreases")]
    DecreasingTimes(usize),
}
