use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use approx::assert_relative_eq;
use thiserror::Error;

use myo_core::{BoundVariables, CellModel, RootSpec, Solver, StepResult};
use myo_pacing::{EventPacing, Pacer, Protocol};

use super::Simulation;
use crate::{
    Action, Config, Crossing, Error, Event, LogSelection, LogSpec, LogSpecError, Progress,
    Settings, Status,
};

// --- Test fixtures ---

/// Model whose state derivatives are fixed slopes. The single intermediate
/// is twice the first state.
struct LinearModel {
    slopes: Vec<f64>,
    states: Vec<f64>,
    derivatives: Vec<f64>,
    intermediates: Vec<f64>,
    bound: BoundVariables,
}

impl LinearModel {
    fn new(slopes: Vec<f64>) -> Self {
        let n = slopes.len();
        Self {
            slopes,
            states: vec![0.0; n],
            derivatives: vec![0.0; n],
            intermediates: vec![0.0; 1],
            bound: BoundVariables::default(),
        }
    }
}

impl CellModel for LinearModel {
    type Error = Infallible;

    fn state_count(&self) -> usize {
        self.slopes.len()
    }

    fn intermediate_count(&self) -> usize {
        1
    }

    fn set_bound_variables(&mut self, bound: BoundVariables) -> bool {
        let changed = bound != self.bound;
        self.bound = bound;
        changed
    }

    fn set_states(&mut self, states: &[f64]) -> bool {
        let changed = states != self.states.as_slice();
        self.states.clear();
        self.states.extend_from_slice(states);
        changed
    }

    fn evaluate_derivatives(&mut self) -> Result<(), Infallible> {
        self.derivatives.clone_from(&self.slopes);
        self.intermediates[0] = 2.0 * self.states[0];
        Ok(())
    }

    fn derivatives(&self) -> &[f64] {
        &self.derivatives
    }

    fn intermediates(&self) -> &[f64] {
        &self.intermediates
    }
}

/// [`LinearModel`] with a one-by-one sensitivity surface whose output
/// sensitivity equals the first state sensitivity.
struct SensModel {
    inner: LinearModel,
    params: Vec<f64>,
    outputs: Vec<Vec<f64>>,
}

impl SensModel {
    fn new(slopes: Vec<f64>) -> Self {
        Self {
            inner: LinearModel::new(slopes),
            params: vec![0.0],
            outputs: Vec::new(),
        }
    }
}

impl CellModel for SensModel {
    type Error = Infallible;

    fn state_count(&self) -> usize {
        self.inner.state_count()
    }

    fn intermediate_count(&self) -> usize {
        self.inner.intermediate_count()
    }

    fn set_bound_variables(&mut self, bound: BoundVariables) -> bool {
        self.inner.set_bound_variables(bound)
    }

    fn set_states(&mut self, states: &[f64]) -> bool {
        self.inner.set_states(states)
    }

    fn evaluate_derivatives(&mut self) -> Result<(), Infallible> {
        self.inner.evaluate_derivatives()
    }

    fn derivatives(&self) -> &[f64] {
        self.inner.derivatives()
    }

    fn intermediates(&self) -> &[f64] {
        self.inner.intermediates()
    }

    fn independent_count(&self) -> usize {
        1
    }

    fn dependent_count(&self) -> usize {
        1
    }

    fn set_parameters_from_independents(&mut self, values: &[f64]) -> bool {
        let changed = values != self.params.as_slice();
        self.params.clear();
        self.params.extend_from_slice(values);
        changed
    }

    fn evaluate_sensitivity_outputs(
        &mut self,
        state_sensitivities: &[Vec<f64>],
    ) -> Result<(), Infallible> {
        self.outputs = vec![vec![state_sensitivities[0][0]]];
        Ok(())
    }

    fn sensitivity_outputs(&self) -> &[Vec<f64>] {
        &self.outputs
    }
}

#[derive(Debug, Error)]
#[error("too much work at t = {0}")]
struct TooMuchWork(f64);

/// Integrator for `state(t) = init + slope * t`, stepping by a fixed `dt`.
///
/// The closed form makes dense output exact anywhere, the way an adaptive
/// integrator's interpolant is exact within its last step. State
/// sensitivities are `t` in every entry.
struct LinearSolver {
    time: f64,
    dt: f64,
    init: Vec<f64>,
    slopes: Vec<f64>,
    fail_at: Option<f64>,
    root: Option<RootSpec>,
    reinits: Vec<f64>,
}

impl LinearSolver {
    fn new(init: Vec<f64>, slopes: Vec<f64>, dt: f64) -> Self {
        Self::starting_at(0.0, init, slopes, dt)
    }

    fn starting_at(time: f64, init: Vec<f64>, slopes: Vec<f64>, dt: f64) -> Self {
        Self {
            time,
            dt,
            init,
            slopes,
            fail_at: None,
            root: None,
            reinits: Vec::new(),
        }
    }

    fn failing_at(mut self, time: f64) -> Self {
        self.fail_at = Some(time);
        self
    }

    fn value(&self, index: usize, t: f64) -> f64 {
        self.init[index] + self.slopes[index] * t
    }
}

impl Solver for LinearSolver {
    type Error = TooMuchWork;

    fn step(&mut self, _bound: f64) -> Result<StepResult, TooMuchWork> {
        let target = self.time + self.dt;
        if let Some(fail) = self.fail_at {
            if target >= fail {
                return Err(TooMuchWork(self.time));
            }
        }
        if let Some(spec) = self.root {
            let a = self.value(spec.state_index, self.time);
            let b = self.value(spec.state_index, target);
            let crosses = (a < spec.threshold && b >= spec.threshold)
                || (a > spec.threshold && b <= spec.threshold);
            if crosses {
                let t_cross = self.time + (spec.threshold - a) / (b - a) * self.dt;
                if t_cross > self.time {
                    self.time = t_cross;
                    return Ok(StepResult::RootFound(t_cross));
                }
            }
        }
        self.time = target;
        Ok(StepResult::Advanced(target))
    }

    fn state(&self, state: &mut [f64]) -> Result<(), TooMuchWork> {
        for (i, value) in state.iter_mut().enumerate() {
            *value = self.value(i, self.time);
        }
        Ok(())
    }

    fn state_sensitivities(&self, sensitivities: &mut [Vec<f64>]) -> Result<(), TooMuchWork> {
        for row in sensitivities.iter_mut() {
            row.fill(self.time);
        }
        Ok(())
    }

    fn dense_output(&mut self, time: f64, state: &mut [f64]) -> Result<(), TooMuchWork> {
        for (i, value) in state.iter_mut().enumerate() {
            *value = self.value(i, time);
        }
        Ok(())
    }

    fn dense_output_sensitivities(
        &mut self,
        time: f64,
        sensitivities: &mut [Vec<f64>],
    ) -> Result<(), TooMuchWork> {
        for row in sensitivities.iter_mut() {
            row.fill(time);
        }
        Ok(())
    }

    fn reinit(
        &mut self,
        time: f64,
        _state: &[f64],
        _sensitivities: Option<&[Vec<f64>]>,
    ) -> Result<(), TooMuchWork> {
        self.time = time;
        self.reinits.push(time);
        Ok(())
    }

    fn root_init(&mut self, spec: RootSpec) -> Result<(), TooMuchWork> {
        self.root = Some(spec);
        Ok(())
    }

    fn root_directions(&mut self) -> Result<Vec<i8>, TooMuchWork> {
        let direction = match self.root {
            Some(spec) if self.slopes[spec.state_index] >= 0.0 => 1,
            Some(_) => -1,
            None => 0,
        };
        Ok(vec![direction])
    }
}

// --- Tests ---

#[test]
fn periodic_logging_is_half_open() {
    let model = LinearModel::new(vec![1.0]);
    let solver = LinearSolver::new(vec![0.0], vec![1.0], 7.0);

    let mut settings = Settings::over(0.0, 100.0);
    settings.log = LogSpec::Periodic { interval: 10.0 };

    let mut sim = Simulation::new(model, solver, vec![], vec![0.0], settings).unwrap();
    assert_eq!(sim.run_unobserved().unwrap(), Status::Finished);

    let outcome = sim.finish();
    assert_eq!(outcome.status, Status::Finished);
    assert_eq!(outcome.time, 100.0);

    // Ten points on [0, 100): the end time itself is excluded.
    let times: Vec<f64> = (0..10).map(|i| f64::from(i) * 10.0).collect();
    assert_eq!(outcome.log.row_count(), 10);
    assert_eq!(outcome.log.values("time").unwrap(), times.as_slice());
    assert_eq!(outcome.log.values("state.0").unwrap(), times.as_slice());
}

#[test]
fn dynamic_logging_visits_every_step_once() {
    let model = LinearModel::new(vec![2.0]);
    let solver = LinearSolver::new(vec![0.0], vec![2.0], 2.0);

    let mut sim =
        Simulation::new(model, solver, vec![], vec![0.0], Settings::over(0.0, 10.0)).unwrap();
    assert_eq!(sim.run_unobserved().unwrap(), Status::Finished);

    let outcome = sim.finish();
    let times = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
    assert_eq!(outcome.log.values("time").unwrap(), &times[..]);

    let states: Vec<f64> = times.iter().map(|t| 2.0 * t).collect();
    assert_eq!(outcome.log.values("state.0").unwrap(), states.as_slice());
}

#[test]
fn resumed_dynamic_run_does_not_duplicate_the_shared_point() {
    let mut first = Simulation::new(
        LinearModel::new(vec![2.0]),
        LinearSolver::new(vec![0.0], vec![2.0], 2.0),
        vec![],
        vec![0.0],
        Settings::over(0.0, 10.0),
    )
    .unwrap();
    first.run_unobserved().unwrap();
    let outcome = first.finish();
    assert_eq!(outcome.log.row_count(), 6);

    let mut second = Simulation::resume(
        LinearModel::new(vec![2.0]),
        LinearSolver::starting_at(10.0, vec![0.0], vec![2.0], 2.0),
        vec![],
        vec![20.0],
        Settings::over(10.0, 20.0),
        (),
        outcome.log,
    )
    .unwrap();
    second.run_unobserved().unwrap();
    let outcome = second.finish();

    let times: Vec<f64> = (0..=10).map(|i| f64::from(i) * 2.0).collect();
    assert_eq!(outcome.log.values("time").unwrap(), times.as_slice());
}

#[test]
fn resume_rejects_mismatched_columns() {
    let mut first = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![0.0],
        Settings::over(0.0, 2.0),
    )
    .unwrap();
    first.run_unobserved().unwrap();
    let log = first.finish().log;

    let mut settings = Settings::over(2.0, 4.0);
    settings.selection = LogSelection::all();

    let result = Simulation::resume(
        LinearModel::new(vec![1.0]),
        LinearSolver::starting_at(2.0, vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![2.0],
        settings,
        (),
        log,
    );
    assert!(matches!(result, Err(Error::LogColumnMismatch)));
}

#[test]
fn rows_never_see_pacing_from_their_future() {
    let mut protocol = Protocol::new();
    protocol.schedule(2.0, 5.0, 3.0, 0.0, 0).unwrap();
    let pacer = Pacer::from(EventPacing::from_protocol(0.0, &protocol).unwrap());

    let mut settings = Settings::over(0.0, 12.0);
    settings.log = LogSpec::Periodic { interval: 3.0 };

    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 4.0),
        vec![pacer],
        vec![0.0],
        settings,
    )
    .unwrap();
    assert_eq!(sim.run_unobserved().unwrap(), Status::Finished);

    // Integration is bounded at the event edges (5 and 8), and the solver
    // is reinitialized at each after overshoot correction.
    assert_eq!(sim.solver().reinits, vec![5.0, 8.0]);

    let outcome = sim.finish();
    assert_eq!(outcome.log.values("time").unwrap(), &[0.0, 3.0, 6.0, 9.0][..]);
    // The event runs over [5, 8): only the row at t = 6 sees it.
    assert_eq!(outcome.log.values("pace").unwrap(), &[0.0, 0.0, 2.0, 0.0][..]);
    assert_eq!(outcome.log.values("state.0").unwrap(), &[0.0, 3.0, 6.0, 9.0][..]);
}

#[test]
fn point_list_logging_skips_points_outside_the_run() {
    let mut settings = Settings::over(0.0, 10.0);
    settings.log = LogSpec::Points {
        times: vec![-1.0, 1.0, 2.5, 12.0],
    };

    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 4.0),
        vec![],
        vec![0.0],
        settings,
    )
    .unwrap();
    sim.run_unobserved().unwrap();

    let outcome = sim.finish();
    assert_eq!(outcome.log.values("time").unwrap(), &[1.0, 2.5][..]);
    assert_eq!(outcome.log.values("state.0").unwrap(), &[1.0, 2.5][..]);
}

#[test]
fn full_selection_logs_fixed_column_order() {
    let mut settings = Settings::over(0.0, 10.0);
    settings.log = LogSpec::Periodic { interval: 5.0 };
    settings.selection = LogSelection::all();

    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 4.0),
        vec![],
        vec![0.0],
        settings,
    )
    .unwrap();
    sim.run_unobserved().unwrap();
    let outcome = sim.finish();

    let names: Vec<&str> = outcome.log.column_names().collect();
    assert_eq!(
        names,
        vec![
            "state.0",
            "dot(state.0)",
            "time",
            "pace",
            "realtime",
            "evals",
            "inter.0"
        ]
    );
    assert_eq!(outcome.log.values("dot(state.0)").unwrap(), &[1.0, 1.0][..]);
    assert_eq!(outcome.log.values("inter.0").unwrap(), &[0.0, 10.0][..]);
}

#[test]
fn stalled_integrator_is_fatal() {
    let mut settings = Settings::over(0.0, 10.0);
    settings.config = Config::new(100, 3).unwrap();

    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 0.0),
        vec![],
        vec![0.0],
        settings,
    )
    .unwrap();

    let err = sim.run_unobserved().unwrap_err();
    assert!(matches!(err, Error::Stalled { count: 4, time } if time == 0.0));
    assert_eq!(sim.finish().status, Status::Failed);
}

#[test]
fn solver_failure_keeps_the_last_completed_state() {
    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 7.0).failing_at(50.0),
        vec![],
        vec![0.0],
        Settings::over(0.0, 100.0),
    )
    .unwrap();

    let err = sim.run_unobserved().unwrap_err();
    assert!(matches!(err, Error::Solver { time, .. } if time == 49.0));
    assert_eq!(err.to_string(), "solver failed at t = 49: too much work at t = 49");

    // The outputs hold the last successfully completed step.
    assert_eq!(sim.time(), 49.0);
    assert_eq!(sim.state(), &[49.0]);
    assert!(matches!(sim.step(), Err(Error::NotRunning)));
    assert_eq!(sim.finish().status, Status::Failed);
}

#[test]
fn threshold_crossings_are_recorded() {
    let mut settings = Settings::over(0.0, 10.0);
    settings.root = Some(RootSpec {
        state_index: 0,
        threshold: 3.0,
    });

    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 2.0),
        vec![],
        vec![0.0],
        settings,
    )
    .unwrap();
    assert_eq!(sim.run_unobserved().unwrap(), Status::Finished);

    assert_eq!(
        sim.crossings(),
        &[Crossing {
            time: 3.0,
            direction: 1
        }]
    );
}

#[test]
fn sensitivities_are_logged_per_point() {
    let mut settings = Settings::over(0.0, 10.0);
    settings.log = LogSpec::Periodic { interval: 5.0 };
    settings.independents = Some(vec![1.5]);

    let mut sim = Simulation::new(
        SensModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 4.0),
        vec![],
        vec![0.0],
        settings,
    )
    .unwrap();

    // The independent values were handed to the model at construction.
    assert_eq!(sim.model().params, vec![1.5]);
    assert_eq!(sim.run_unobserved().unwrap(), Status::Finished);

    let outcome = sim.finish();
    assert_eq!(
        outcome.sensitivity_log,
        Some(vec![vec![vec![0.0]], vec![vec![5.0]]])
    );
    assert_eq!(outcome.sensitivities, Some(vec![vec![10.0]]));
}

#[test]
fn independents_must_match_the_model() {
    let mut settings = Settings::over(0.0, 10.0);
    settings.independents = Some(vec![1.0, 2.0]);

    let result = Simulation::new(
        SensModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 4.0),
        vec![],
        vec![0.0],
        settings,
    );
    assert!(matches!(
        result,
        Err(Error::IndependentSizeMismatch { expected: 1, got: 2 })
    ));
}

#[test]
fn observer_can_stop_a_run_early() {
    let mut settings = Settings::over(0.0, 1000.0);
    settings.config = Config::new(2, 500).unwrap();

    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![0.0],
        settings,
    )
    .unwrap();

    let mut seen = Vec::new();
    let status = sim
        .run(|event: &Event| {
            seen.push(event.time);
            Some(Action::StopEarly)
        })
        .unwrap();

    assert_eq!(status, Status::Stopped);
    assert_eq!(seen, vec![2.0]);
    assert_eq!(sim.time(), 2.0);
    assert_eq!(sim.finish().status, Status::Stopped);
}

#[test]
fn interrupt_aborts_between_steps() {
    let flag = Arc::new(AtomicBool::new(false));

    let mut sim = Simulation::with_interrupt(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![0.0],
        Settings::over(0.0, 1000.0),
        Arc::clone(&flag),
    )
    .unwrap();

    flag.store(true, Ordering::Relaxed);
    let err = sim.run_unobserved().unwrap_err();
    assert!(matches!(err, Error::Interrupted(t) if t == 0.0));
}

#[test]
fn zero_length_run_finishes_immediately() {
    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::starting_at(5.0, vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![5.0],
        Settings::over(5.0, 5.0),
    )
    .unwrap();

    assert_eq!(sim.step().unwrap(), Progress::Finished(5.0));
    assert_eq!(sim.step().unwrap(), Progress::Finished(5.0));

    // Dynamic mode still logs the initial point.
    let outcome = sim.finish();
    assert_eq!(outcome.log.values("time").unwrap(), &[5.0][..]);
}

#[test]
fn construction_validates_its_inputs() {
    let settings = Settings::over(5.0, 1.0);
    let result = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![0.0],
        settings,
    );
    assert!(matches!(
        result,
        Err(Error::InvalidInterval { tmin, tmax }) if tmin == 5.0 && tmax == 1.0
    ));

    let result = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![0.0, 0.0],
        Settings::over(0.0, 1.0),
    );
    assert!(matches!(
        result,
        Err(Error::StateSizeMismatch { expected: 1, got: 2 })
    ));

    let mut settings = Settings::over(0.0, 1.0);
    settings.root = Some(RootSpec {
        state_index: 3,
        threshold: 0.0,
    });
    let result = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![0.0],
        settings,
    );
    assert!(matches!(
        result,
        Err(Error::RootIndexOutOfRange { index: 3, states: 1 })
    ));

    let mut settings = Settings::over(0.0, 1.0);
    settings.log = LogSpec::Periodic { interval: 0.0 };
    let result = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 1.0),
        vec![],
        vec![0.0],
        settings,
    );
    assert!(matches!(
        result,
        Err(Error::InvalidLogSpec(LogSpecError::Interval(i))) if i == 0.0
    ));
}

#[test]
fn end_time_lands_exactly_despite_round_off() {
    // Accumulated 0.1 steps land a few ulps away from 1.0; the run still
    // ends at exactly 1.0.
    let mut sim = Simulation::new(
        LinearModel::new(vec![1.0]),
        LinearSolver::new(vec![0.0], vec![1.0], 0.1),
        vec![],
        vec![0.0],
        Settings::over(0.0, 1.0),
    )
    .unwrap();
    assert_eq!(sim.run_unobserved().unwrap(), Status::Finished);

    let outcome = sim.finish();
    assert_eq!(outcome.time, 1.0);
    assert_relative_eq!(outcome.state[0], 1.0, epsilon = 1e-12);
}
