use thiserror::Error;

/// Configuration for the simulation stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    steps_per_call: usize,
    stall_limit: usize,
}

/// Errors that can occur when validating a stepper config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("steps_per_call must be at least 1")]
    StepsPerCall,

    #[error("stall_limit must be at least 1")]
    StallLimit,
}

impl Default for Config {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(100, 500).unwrap()
    }
}

impl Config {
    /// Creates a new config.
    ///
    /// `steps_per_call` bounds the number of integrator steps taken per
    /// [`step`](crate::Simulation::step) call before control returns to
    /// the caller. `stall_limit` is the number of consecutive zero-length
    /// integrator steps tolerated before the run is aborted.
    ///
    /// # Errors
    ///
    /// Returns an error if either bound is zero.
    pub fn new(steps_per_call: usize, stall_limit: usize) -> Result<Self, ConfigError> {
        if steps_per_call == 0 {
            return Err(ConfigError::StepsPerCall);
        }
        if stall_limit == 0 {
            return Err(ConfigError::StallLimit);
        }
        Ok(Self {
            steps_per_call,
            stall_limit,
        })
    }

    /// Returns the number of integrator steps per `step` call.
    #[must_use]
    pub fn steps_per_call(&self) -> usize {
        self.steps_per_call
    }

    /// Returns the zero-length step limit.
    #[must_use]
    pub fn stall_limit(&self) -> usize {
        self.stall_limit
    }
}
