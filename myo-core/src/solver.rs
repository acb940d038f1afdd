/// Outcome of a single internal integrator step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepResult {
    /// The integrator advanced its solution to the given time.
    Advanced(f64),

    /// A root of the installed threshold function was located at the given
    /// time; the solution was advanced exactly there.
    RootFound(f64),
}

impl StepResult {
    /// The time the solution was advanced to.
    #[must_use]
    pub fn time(&self) -> f64 {
        match self {
            Self::Advanced(t) | Self::RootFound(t) => *t,
        }
    }
}

/// Configures integrator root tracking: report when the state variable at
/// `state_index` crosses `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootSpec {
    /// Index of the monitored state variable.
    pub state_index: usize,

    /// Threshold whose crossings are reported.
    pub threshold: f64,
}

/// An adaptive ODE/DAE integrator driven by the simulation stepper.
///
/// The integrator owns its internal solution vectors and its handle to the
/// model's right-hand side. The stepper only ever asks it to advance by one
/// internal step, to reconstruct the solution at a time inside the last
/// completed step (dense output), and to reset its step history at pacing
/// discontinuities.
pub trait Solver {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Advances the solution by one internal step toward `bound`.
    ///
    /// The integrator chooses its own step size and may land past `bound`;
    /// the caller reconciles overshoot through [`dense_output`].
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the step fails. The error carries the
    /// integrator's own failure classification and is surfaced verbatim.
    ///
    /// [`dense_output`]: Solver::dense_output
    fn step(&mut self, bound: f64) -> Result<StepResult, Self::Error>;

    /// Copies the current solution into `state`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the solution is unavailable.
    fn state(&self, state: &mut [f64]) -> Result<(), Self::Error>;

    /// Copies the current state sensitivities (`[independent][state]`) into
    /// `sensitivities`.
    ///
    /// Only called when sensitivity propagation is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if sensitivities are unavailable.
    fn state_sensitivities(&self, sensitivities: &mut [Vec<f64>]) -> Result<(), Self::Error>;

    /// Reconstructs the solution at `time` within the last completed step
    /// without re-integrating.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if `time` lies outside the last step.
    fn dense_output(&mut self, time: f64, state: &mut [f64]) -> Result<(), Self::Error>;

    /// Reconstructs the state sensitivities at `time` within the last
    /// completed step.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if `time` lies outside the last step.
    fn dense_output_sensitivities(
        &mut self,
        time: f64,
        sensitivities: &mut [Vec<f64>],
    ) -> Result<(), Self::Error>;

    /// Resets the integrator's internal step history at a discontinuity.
    ///
    /// The integrator must not assume smoothness across the reset point.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if reinitialization fails.
    fn reinit(
        &mut self,
        time: f64,
        state: &[f64],
        sensitivities: Option<&[Vec<f64>]>,
    ) -> Result<(), Self::Error>;

    /// Installs a scalar threshold-crossing function to track during
    /// integration.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if root tracking cannot be enabled.
    fn root_init(&mut self, spec: RootSpec) -> Result<(), Self::Error>;

    /// Crossing directions for the most recent [`StepResult::RootFound`]
    /// return: +1 when the threshold was approached from below, -1 from
    /// above.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if no root information is available.
    fn root_directions(&mut self) -> Result<Vec<i8>, Self::Error>;
}
