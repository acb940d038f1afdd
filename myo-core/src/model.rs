use crate::BoundVariables;

/// A generated cell model evaluated by the simulation stepper.
///
/// Implementations are typically produced by a code generator from a
/// symbolic model description. The stepper uses this trait for logging and
/// output evaluation; the [`Solver`](crate::Solver) holds its own handle to
/// the model's right-hand side.
///
/// # Change tracking
///
/// The setters return whether any value actually changed, so callers can
/// skip redundant re-evaluation. A model must compare against its cached
/// inputs and report `false` when nothing moved.
pub trait CellModel {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Number of state variables.
    fn state_count(&self) -> usize;

    /// Number of intermediate variables.
    fn intermediate_count(&self) -> usize;

    /// Names of the state variables, in evaluation order.
    fn state_names(&self) -> Vec<String> {
        (0..self.state_count()).map(|i| format!("state.{i}")).collect()
    }

    /// Names of the intermediate variables, in evaluation order.
    fn intermediate_names(&self) -> Vec<String> {
        (0..self.intermediate_count())
            .map(|i| format!("inter.{i}"))
            .collect()
    }

    /// Sets the externally bound inputs. Returns whether any value changed.
    fn set_bound_variables(&mut self, bound: BoundVariables) -> bool;

    /// Sets the state variables. Returns whether any value changed.
    fn set_states(&mut self, states: &[f64]) -> bool;

    /// Recomputes derivatives and intermediates from the current inputs.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if evaluation fails (e.g. a domain error in
    /// the model equations).
    fn evaluate_derivatives(&mut self) -> Result<(), Self::Error>;

    /// The derivatives computed by the last [`evaluate_derivatives`] call.
    ///
    /// [`evaluate_derivatives`]: CellModel::evaluate_derivatives
    fn derivatives(&self) -> &[f64];

    /// The intermediates computed by the last [`evaluate_derivatives`] call.
    ///
    /// [`evaluate_derivatives`]: CellModel::evaluate_derivatives
    fn intermediates(&self) -> &[f64];

    /// Number of independent variables for forward sensitivity analysis.
    ///
    /// Models without a sensitivity surface return 0.
    fn independent_count(&self) -> usize {
        0
    }

    /// Number of dependent variables for forward sensitivity analysis.
    fn dependent_count(&self) -> usize {
        0
    }

    /// Sets the parameter values targeted by the independent variables.
    /// Returns whether any value changed.
    fn set_parameters_from_independents(&mut self, values: &[f64]) -> bool {
        let _ = values;
        false
    }

    /// Recomputes the sensitivity outputs from the current inputs and the
    /// given state sensitivities (`[independent][state]`).
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if evaluation fails.
    fn evaluate_sensitivity_outputs(
        &mut self,
        state_sensitivities: &[Vec<f64>],
    ) -> Result<(), Self::Error> {
        let _ = state_sensitivities;
        Ok(())
    }

    /// The sensitivity outputs computed by the last
    /// [`evaluate_sensitivity_outputs`] call (`[dependent][independent]`).
    ///
    /// [`evaluate_sensitivity_outputs`]: CellModel::evaluate_sensitivity_outputs
    fn sensitivity_outputs(&self) -> &[Vec<f64>] {
        &[]
    }
}
