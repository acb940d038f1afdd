use myo_core::RootSpec;

use crate::config::Config;
use crate::log::{LogSelection, LogSpec};

/// Everything a [`Simulation`](crate::Simulation) needs beyond its
/// collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Start of the run.
    pub tmin: f64,

    /// End of the run.
    pub tmax: f64,

    /// How logging time points are chosen.
    pub log: LogSpec,

    /// Which variable classes are logged.
    pub selection: LogSelection,

    /// Initial values for the model's independent variables; supplying
    /// them enables forward sensitivity propagation.
    pub independents: Option<Vec<f64>>,

    /// Enables threshold-crossing detection on one state variable.
    pub root: Option<RootSpec>,

    /// Stepper bounds.
    pub config: Config,
}

impl Settings {
    /// Creates settings for a run over `[tmin, tmax]` with dynamic
    /// logging of states and bound variables and everything else off.
    #[must_use]
    pub fn over(tmin: f64, tmax: f64) -> Self {
        Self {
            tmin,
            tmax,
            log: LogSpec::Dynamic,
            selection: LogSelection::default(),
            independents: None,
            root: None,
            config: Config::default(),
        }
    }
}
