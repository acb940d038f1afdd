use myo_core::{BoundVariables, Sink};

use crate::log::SimulationLog;
use crate::root::Crossing;

/// A sensitivity matrix, `[dependent][independent]` for output
/// sensitivities and `[independent][state]` for state sensitivities.
pub type SensitivityMatrix = Vec<Vec<f64>>;

/// Reported by [`step`](crate::Simulation::step) when control returns to
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// The step budget was exhausted; call `step` again to resume.
    Continuing(f64),

    /// The run reached its end time.
    Finished(f64),
}

/// Indicates how a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The run reached its end time.
    Finished,

    /// The run was stopped before its end time.
    Stopped,

    /// The run was aborted by an error.
    Failed,
}

/// Everything a finished (or abandoned) simulation produced.
///
/// After a failed run the state and bound variables hold the values of the
/// last successfully completed step.
#[derive(Debug)]
pub struct Outcome<K: Sink = Vec<f64>> {
    /// How the run ended.
    pub status: Status,

    /// Final simulation time.
    pub time: f64,

    /// Final state values.
    pub state: Vec<f64>,

    /// Final state sensitivities (`[independent][state]`), when enabled.
    pub sensitivities: Option<SensitivityMatrix>,

    /// Final bound-variable values.
    pub bound: BoundVariables,

    /// Recorded threshold crossings, in order of occurrence.
    pub crossings: Vec<Crossing>,

    /// Total derivative evaluations performed for logging.
    pub evals: u64,

    /// Total integrator steps taken.
    pub steps: usize,

    /// The time-aligned value log.
    pub log: SimulationLog<K>,

    /// One output-sensitivity matrix (`[dependent][independent]`) per
    /// logged time point, when enabled.
    pub sensitivity_log: Option<Vec<SensitivityMatrix>>,
}
