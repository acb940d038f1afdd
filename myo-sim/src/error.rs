use std::error::Error as StdError;

use thiserror::Error;

use myo_pacing::PacingError;

use crate::config::ConfigError;
use crate::log::LogSpecError;

/// Errors that can occur while building or running a simulation.
///
/// No variant is retried internally; every error is fatal to the run and
/// propagates to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("invalid log spec: {0}")]
    InvalidLogSpec(#[from] LogSpecError),

    #[error("invalid run interval [{tmin}, {tmax}]")]
    InvalidInterval { tmin: f64, tmax: f64 },

    #[error("expected {expected} initial state values, got {got}")]
    StateSizeMismatch { expected: usize, got: usize },

    #[error("expected {expected} independent variable values, got {got}")]
    IndependentSizeMismatch { expected: usize, got: usize },

    #[error("root state index {index} out of range for {states} states")]
    RootIndexOutOfRange { index: usize, states: usize },

    #[error("resumed log columns do not match the current selection")]
    LogColumnMismatch,

    #[error("pacing failed: {0}")]
    Pacing(#[from] PacingError),

    #[error("solver failed at t = {time}: {source}")]
    Solver {
        time: f64,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("model evaluation failed at t = {time}: {source}")]
    Model {
        time: f64,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("{count} consecutive zero-length steps at t = {time}")]
    Stalled { count: usize, time: f64 },

    #[error("log index overflow")]
    LogIndexOverflow,

    #[error("interrupted at t = {0}")]
    Interrupted(f64),

    #[error("simulation is no longer running")]
    NotRunning,
}

impl Error {
    pub(crate) fn solver<E: StdError + Send + Sync + 'static>(time: f64, err: E) -> Self {
        Self::Solver {
            time,
            source: Box::new(err),
        }
    }

    pub(crate) fn model<E: StdError + Send + Sync + 'static>(time: f64, err: E) -> Self {
        Self::Model {
            time,
            source: Box::new(err),
        }
    }
}
