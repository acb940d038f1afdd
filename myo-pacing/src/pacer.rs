use myo_core::Interrupt;

use crate::error::PacingError;
use crate::system::EventPacing;
use crate::time_series::TimeSeriesPacing;

/// A pacing source of either kind behind one advance-and-query surface.
///
/// The variant is resolved once at construction; callers advance the pacer
/// and read levels without caring how the signal is produced. A time
/// series has no discontinuities to report, so its next boundary is
/// always infinity.
#[derive(Debug, Clone)]
pub enum Pacer {
    /// Discrete-event pacing from a scheduled protocol.
    Events(EventPacing),

    /// Interpolated pacing from a recorded time/value table.
    TimeSeries(TimeSeriesPacing),
}

impl Pacer {
    /// Advances the pacer to `time` and returns the level there.
    ///
    /// # Errors
    ///
    /// Returns a [`PacingError`] from the event system; time-series
    /// lookups cannot fail.
    pub fn advance_to<I: Interrupt>(
        &mut self,
        time: f64,
        interrupt: &I,
    ) -> Result<f64, PacingError> {
        match self {
            Self::Events(system) => system.advance_to(time, interrupt),
            Self::TimeSeries(system) => Ok(system.level_at(time)),
        }
    }

    /// The time of the pacer's next discontinuity, or infinity when there
    /// is none.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::Unpopulated`] for an unpopulated event
    /// system.
    pub fn next_time(&self) -> Result<f64, PacingError> {
        match self {
            Self::Events(system) => system.next_time(),
            Self::TimeSeries(_) => Ok(f64::INFINITY),
        }
    }
}

impl From<EventPacing> for Pacer {
    fn from(system: EventPacing) -> Self {
        Self::Events(system)
    }
}

impl From<TimeSeriesPacing> for Pacer {
    fn from(system: TimeSeriesPacing) -> Self {
        Self::TimeSeries(system)
    }
}
