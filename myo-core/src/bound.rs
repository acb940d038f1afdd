/// Values for the externally bound inputs of a cell model.
///
/// Bound variables are not part of the model state: they are imposed from
/// outside at every evaluation. The stepper refreshes them before each
/// model call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundVariables {
    /// Simulation time.
    pub time: f64,

    /// Current pacing level (dimensionless, 0 when no event fires).
    pub pace: f64,

    /// Wall-clock seconds since the run started.
    pub realtime: f64,

    /// Cumulative number of derivative evaluations.
    pub evals: f64,
}

impl BoundVariables {
    /// Returns bound variables at the given time with all other inputs zero.
    #[must_use]
    pub fn at(time: f64) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }
}
