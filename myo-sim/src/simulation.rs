//! The event-driven simulation control loop.
//!
//! # Stepping
//!
//! Each inner iteration:
//!
//! 1. Asks the solver for one internal step bounded by the next pacing
//!    discontinuity (or the end of the run).
//! 2. Counts consecutive zero-length steps and aborts once the configured
//!    limit is exceeded.
//! 3. If the step landed past the boundary, recovers the exact boundary
//!    solution through dense output and schedules a reinitialization.
//! 4. If the solver located a threshold crossing instead, records it.
//! 5. Drains interpolated log points up to the current time.
//! 6. Advances the pacing systems — only after logging, so a logged row
//!    never reflects pacing state from its future — and recomputes the
//!    next boundary.
//! 7. In dynamic mode, logs the point the integrator just visited.
//! 8. Performs the scheduled reinitialization, then checks for the end of
//!    the run.
//!
//! Control returns to the caller after a bounded number of inner
//! iterations, making a long run cooperatively interruptible.

#[cfg(test)]
mod tests;

use std::time::Instant;

use myo_core::{BoundVariables, CellModel, Interrupt, Observer, Sink, Solver, StepResult, time};
use myo_pacing::Pacer;

use crate::action::Action;
use crate::config::Config;
use crate::error::Error;
use crate::event::Event;
use crate::log::{LogSelection, LogSpec, SimulationLog, column_names};
use crate::root::Crossing;
use crate::settings::Settings;
use crate::solution::{Outcome, Progress, SensitivityMatrix, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Finished,
    Failed,
}

/// Advances a model/solver pair through a paced run.
///
/// A simulation owns its collaborators for the duration of the run: the
/// model used for logging evaluations, the integrator, and the pacing
/// systems. Construction performs all validation and allocation; once
/// built, the run either completes, is stopped, or fails — nothing is
/// retried internally.
///
/// Drive it with [`run`](Simulation::run) (or
/// [`run_unobserved`](Simulation::run_unobserved)), or call
/// [`step`](Simulation::step) directly for manual control, then collect
/// everything with [`finish`](Simulation::finish).
pub struct Simulation<M, S, I = (), K = Vec<f64>>
where
    M: CellModel,
    S: Solver,
    I: Interrupt,
    K: Sink,
{
    model: M,
    solver: S,
    pacers: Vec<Pacer>,
    interrupt: I,

    config: Config,
    selection: LogSelection,
    spec: LogSpec,
    sensitivities: bool,

    tmin: f64,
    tmax: f64,
    time: f64,
    next_boundary: f64,
    pace: f64,

    state: Vec<f64>,
    /// Separate logging vector for interpolated modes, so dense output for
    /// logging never perturbs the live integration state. Empty in dynamic
    /// mode.
    interp_state: Vec<f64>,
    state_sens: SensitivityMatrix,
    interp_sens: SensitivityMatrix,

    log: SimulationLog<K>,
    log_index: usize,
    row: Vec<f64>,
    sensitivity_log: Vec<SensitivityMatrix>,

    crossings: Vec<Crossing>,
    zero_steps: usize,
    evals: u64,
    steps_taken: usize,
    started: Instant,
    phase: Phase,
}

impl<M, S> Simulation<M, S>
where
    M: CellModel,
    S: Solver,
{
    /// Creates a simulation with a fresh log and no interrupt.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the settings, initial state, or root spec
    /// are invalid, or if a collaborator fails during setup.
    pub fn new(
        model: M,
        solver: S,
        pacers: Vec<Pacer>,
        initial_states: Vec<f64>,
        settings: Settings,
    ) -> Result<Self, Error> {
        Self::with_interrupt(model, solver, pacers, initial_states, settings, ())
    }
}

impl<M, S, I> Simulation<M, S, I>
where
    M: CellModel,
    S: Solver,
    I: Interrupt,
{
    /// Creates a simulation with a fresh log and the given interrupt.
    ///
    /// # Errors
    ///
    /// See [`new`](Simulation::new).
    pub fn with_interrupt(
        model: M,
        solver: S,
        pacers: Vec<Pacer>,
        initial_states: Vec<f64>,
        settings: Settings,
        interrupt: I,
    ) -> Result<Self, Error> {
        let log = SimulationLog::for_model(&model, settings.selection);
        Self::build(model, solver, pacers, initial_states, settings, interrupt, log)
    }
}

impl<M, S, I, K> Simulation<M, S, I, K>
where
    M: CellModel,
    S: Solver,
    I: Interrupt,
    K: Sink,
{
    /// Creates a simulation that continues logging into an existing log.
    ///
    /// The previous run's half-open logging left its end point to this
    /// run, so consecutive resumed runs concatenate without duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogColumnMismatch`] when the log's columns do not
    /// match the current model and selection; otherwise see
    /// [`new`](Simulation::new).
    pub fn resume(
        model: M,
        solver: S,
        pacers: Vec<Pacer>,
        initial_states: Vec<f64>,
        settings: Settings,
        interrupt: I,
        log: SimulationLog<K>,
    ) -> Result<Self, Error> {
        if !log.matches_columns(&column_names(&model, settings.selection)) {
            return Err(Error::LogColumnMismatch);
        }
        Self::build(model, solver, pacers, initial_states, settings, interrupt, log)
    }

    fn build(
        mut model: M,
        mut solver: S,
        mut pacers: Vec<Pacer>,
        initial_states: Vec<f64>,
        settings: Settings,
        interrupt: I,
        log: SimulationLog<K>,
    ) -> Result<Self, Error> {
        let Settings {
            tmin,
            tmax,
            log: spec,
            selection,
            independents,
            root,
            config,
        } = settings;

        if !tmin.is_finite() || !tmax.is_finite() || tmax < tmin {
            return Err(Error::InvalidInterval { tmin, tmax });
        }
        spec.validate()?;

        let n = model.state_count();
        if initial_states.len() != n {
            return Err(Error::StateSizeMismatch {
                expected: n,
                got: initial_states.len(),
            });
        }

        if let Some(root_spec) = root {
            if root_spec.state_index >= n {
                return Err(Error::RootIndexOutOfRange {
                    index: root_spec.state_index,
                    states: n,
                });
            }
            solver
                .root_init(root_spec)
                .map_err(|e| Error::solver(tmin, e))?;
        }

        // Supplying independents enables forward sensitivity propagation.
        let sensitivities = independents.is_some();
        let n_indep = if sensitivities {
            model.independent_count()
        } else {
            0
        };
        if let Some(values) = &independents {
            if values.len() != n_indep {
                return Err(Error::IndependentSizeMismatch {
                    expected: n_indep,
                    got: values.len(),
                });
            }
            model.set_parameters_from_independents(values);
        }
        let state_sens = vec![vec![0.0; n]; n_indep];

        let interpolated = !matches!(spec, LogSpec::Dynamic);
        let interp_state = if interpolated { vec![0.0; n] } else { Vec::new() };
        let interp_sens = if interpolated {
            vec![vec![0.0; n]; n_indep]
        } else {
            Vec::new()
        };

        let mut pace = 0.0;
        for pacer in &mut pacers {
            pace += pacer.advance_to(tmin, &interrupt)?;
        }
        let next_boundary = boundary(tmax, &pacers)?;

        // Explicit log points that precede the run are unreachable.
        let log_index = match &spec {
            LogSpec::Points { times } => times
                .iter()
                .position(|&t| t >= tmin)
                .unwrap_or(times.len()),
            _ => 0,
        };

        model.set_states(&initial_states);

        let mut sim = Self {
            model,
            solver,
            pacers,
            interrupt,
            config,
            selection,
            spec,
            sensitivities,
            tmin,
            tmax,
            time: tmin,
            next_boundary,
            pace,
            state: initial_states,
            interp_state,
            state_sens,
            interp_sens,
            log,
            log_index,
            row: Vec::new(),
            sensitivity_log: Vec::new(),
            crossings: Vec::new(),
            zero_steps: 0,
            evals: 0,
            steps_taken: 0,
            started: Instant::now(),
            phase: Phase::Running,
        };

        // First run in dynamic mode logs the initial point; a resumed run
        // already holds it as the previous call's final point.
        if matches!(sim.spec, LogSpec::Dynamic) && sim.log.is_empty() {
            sim.log_dynamic_point()?;
        }

        Ok(sim)
    }

    /// Runs a bounded batch of integrator steps.
    ///
    /// Returns [`Progress::Continuing`] when the step budget was exhausted
    /// before the end of the run; call again to resume. Calling after the
    /// run finished returns [`Progress::Finished`] again.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] on any fatal condition; afterwards the
    /// simulation refuses to step further, but its final values remain
    /// readable and hold the last successfully completed step.
    pub fn step(&mut self) -> Result<Progress, Error> {
        match self.phase {
            Phase::Running => {}
            Phase::Finished => return Ok(Progress::Finished(self.time)),
            Phase::Failed => return Err(Error::NotRunning),
        }

        if self.time >= self.tmax {
            self.phase = Phase::Finished;
            return Ok(Progress::Finished(self.time));
        }

        for _ in 0..self.config.steps_per_call() {
            if self.interrupt.is_raised() {
                self.phase = Phase::Failed;
                return Err(Error::Interrupted(self.time));
            }
            if let Err(e) = self.advance() {
                self.phase = Phase::Failed;
                return Err(e);
            }
            if self.phase == Phase::Finished {
                return Ok(Progress::Finished(self.time));
            }
        }

        Ok(Progress::Continuing(self.time))
    }

    /// Runs to completion, emitting an [`Event`] to the observer after
    /// each cooperative batch of steps.
    ///
    /// The observer may return [`Action::StopEarly`] to end the run before
    /// its end time.
    ///
    /// # Errors
    ///
    /// See [`step`](Simulation::step).
    pub fn run<Obs>(&mut self, mut observer: Obs) -> Result<Status, Error>
    where
        Obs: Observer<Event, Action>,
    {
        loop {
            match self.step()? {
                Progress::Finished(_) => return Ok(Status::Finished),
                Progress::Continuing(t) => {
                    let event = Event {
                        time: t,
                        steps: self.steps_taken,
                    };
                    if let Some(Action::StopEarly) = observer.observe(&event) {
                        return Ok(Status::Stopped);
                    }
                }
            }
        }
    }

    /// Runs to completion without observation.
    ///
    /// # Errors
    ///
    /// See [`step`](Simulation::step).
    pub fn run_unobserved(&mut self) -> Result<Status, Error> {
        self.run(())
    }

    /// Consumes the simulation and returns everything it produced.
    pub fn finish(self) -> Outcome<K> {
        let status = match self.phase {
            Phase::Finished => Status::Finished,
            Phase::Running => Status::Stopped,
            Phase::Failed => Status::Failed,
        };
        let bound = BoundVariables {
            time: self.time,
            pace: self.pace,
            realtime: self.started.elapsed().as_secs_f64(),
            evals: self.evals as f64,
        };
        Outcome {
            status,
            time: self.time,
            state: self.state,
            sensitivities: self.sensitivities.then_some(self.state_sens),
            bound,
            crossings: self.crossings,
            evals: self.evals,
            steps: self.steps_taken,
            log: self.log,
            sensitivity_log: self.sensitivities.then_some(self.sensitivity_log),
        }
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Current state values.
    #[must_use]
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// The log produced so far.
    #[must_use]
    pub fn log(&self) -> &SimulationLog<K> {
        &self.log
    }

    /// Threshold crossings recorded so far.
    #[must_use]
    pub fn crossings(&self) -> &[Crossing] {
        &self.crossings
    }

    /// The model collaborator.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// The solver collaborator.
    #[must_use]
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// One inner iteration of the control loop.
    fn advance(&mut self) -> Result<(), Error> {
        // A failed step leaves the previous state and inputs in place as
        // the reported outputs.
        let result = self
            .solver
            .step(self.next_boundary)
            .map_err(|e| Error::solver(self.time, e))?;
        self.steps_taken += 1;
        let stepped_to = result.time();

        // Too many zero-length steps means the integrator cannot advance.
        if stepped_to == self.time {
            self.zero_steps += 1;
            if self.zero_steps > self.config.stall_limit() {
                return Err(Error::Stalled {
                    count: self.zero_steps,
                    time: stepped_to,
                });
            }
        } else {
            self.zero_steps = 0;
        }

        self.solver
            .state(&mut self.state)
            .map_err(|e| Error::solver(stepped_to, e))?;
        if self.sensitivities {
            self.solver
                .state_sensitivities(&mut self.state_sens)
                .map_err(|e| Error::solver(stepped_to, e))?;
        }

        // A step past the boundary is pulled back onto it with dense
        // output; the pacing discontinuity there invalidates the
        // integrator's history, so it must be reinitialized after logging.
        let mut reinit = false;
        let mut now = stepped_to;
        if stepped_to > self.next_boundary {
            now = self.next_boundary;
            self.solver
                .dense_output(now, &mut self.state)
                .map_err(|e| Error::solver(now, e))?;
            if self.sensitivities {
                self.solver
                    .dense_output_sensitivities(now, &mut self.state_sens)
                    .map_err(|e| Error::solver(now, e))?;
            }
            reinit = true;
        } else if let StepResult::RootFound(t) = result {
            let direction = self
                .solver
                .root_directions()
                .map_err(|e| Error::solver(t, e))?
                .first()
                .copied()
                .unwrap_or(0);
            self.crossings.push(Crossing { time: t, direction });
        }
        self.time = now;

        // Drain interpolated log points up to the current time. The end
        // of the run is excluded: consecutive resumed runs share that
        // point, and only the later run logs it.
        if !matches!(self.spec, LogSpec::Dynamic) {
            while let Some(tlog) = self.next_log_time() {
                if tlog > self.time || tlog >= self.tmax {
                    break;
                }
                self.log_interpolated_point(tlog)?;
                self.log_index = self
                    .log_index
                    .checked_add(1)
                    .ok_or(Error::LogIndexOverflow)?;
            }
        }

        // Pacing must not move until everything up to the current time is
        // logged; a row must never reflect pacing state from its future.
        let mut pace = 0.0;
        for pacer in &mut self.pacers {
            pace += pacer.advance_to(self.time, &self.interrupt)?;
        }
        if !self.pacers.is_empty() {
            self.pace = pace;
        }
        self.next_boundary = boundary(self.tmax, &self.pacers)?;

        if matches!(self.spec, LogSpec::Dynamic) {
            self.log_dynamic_point()?;
        }

        if reinit {
            let sens = self.sensitivities.then_some(self.state_sens.as_slice());
            self.solver
                .reinit(self.time, &self.state, sens)
                .map_err(|e| Error::solver(self.time, e))?;
        }

        // Land exactly on the end time.
        if time::geq(self.time, self.tmax) {
            self.time = self.tmax;
            self.phase = Phase::Finished;
        }
        Ok(())
    }

    /// The next scheduled log time, for interpolated modes.
    fn next_log_time(&self) -> Option<f64> {
        match &self.spec {
            LogSpec::Dynamic => None,
            // The grid is multiplied out rather than accumulated, so late
            // points do not drift.
            LogSpec::Periodic { interval } => {
                Some(self.tmin + (self.log_index as f64) * interval)
            }
            LogSpec::Points { times } => times.get(self.log_index).copied(),
        }
    }

    /// Logs the point the integrator is currently at (dynamic mode).
    fn log_dynamic_point(&mut self) -> Result<(), Error> {
        let needs_eval =
            self.selection.derivatives || self.selection.intermediates || self.sensitivities;
        let bound = BoundVariables {
            time: self.time,
            pace: self.pace,
            realtime: self.started.elapsed().as_secs_f64(),
            evals: self.evals as f64,
        };
        self.model.set_bound_variables(bound);
        self.model.set_states(&self.state);
        if needs_eval {
            self.model
                .evaluate_derivatives()
                .map_err(|e| Error::model(self.time, e))?;
            self.evals += 1;
        }
        self.push_row(bound, false);
        if self.sensitivities {
            self.model
                .evaluate_sensitivity_outputs(&self.state_sens)
                .map_err(|e| Error::model(self.time, e))?;
            self.sensitivity_log
                .push(self.model.sensitivity_outputs().to_vec());
        }
        Ok(())
    }

    /// Logs an exact time via dense output (periodic and point modes).
    fn log_interpolated_point(&mut self, tlog: f64) -> Result<(), Error> {
        self.solver
            .dense_output(tlog, &mut self.interp_state)
            .map_err(|e| Error::solver(tlog, e))?;
        if self.sensitivities {
            self.solver
                .dense_output_sensitivities(tlog, &mut self.interp_sens)
                .map_err(|e| Error::solver(tlog, e))?;
        }
        let bound = BoundVariables {
            time: tlog,
            pace: self.pace,
            realtime: self.started.elapsed().as_secs_f64(),
            evals: self.evals as f64,
        };
        self.model.set_bound_variables(bound);
        self.model.set_states(&self.interp_state);
        self.model
            .evaluate_derivatives()
            .map_err(|e| Error::model(tlog, e))?;
        self.evals += 1;
        self.push_row(bound, true);
        if self.sensitivities {
            self.model
                .evaluate_sensitivity_outputs(&self.interp_sens)
                .map_err(|e| Error::model(tlog, e))?;
            self.sensitivity_log
                .push(self.model.sensitivity_outputs().to_vec());
        }
        Ok(())
    }

    /// Appends one row in fixed column order: states, derivatives, bound
    /// variables, intermediates. `bound` holds the values just set on the
    /// model, so the row matches the model inputs exactly.
    fn push_row(&mut self, bound: BoundVariables, use_interp: bool) {
        let mut row = std::mem::take(&mut self.row);
        row.clear();
        let states: &[f64] = if use_interp {
            &self.interp_state
        } else {
            &self.state
        };
        if self.selection.states {
            row.extend_from_slice(states);
        }
        if self.selection.derivatives {
            row.extend_from_slice(self.model.derivatives());
        }
        if self.selection.bound {
            row.extend_from_slice(&[bound.time, bound.pace, bound.realtime, bound.evals]);
        }
        if self.selection.intermediates {
            row.extend_from_slice(self.model.intermediates());
        }
        self.log.append_row(&row);
        self.row = row;
    }
}

/// The earliest upcoming discontinuity, bounded by the end of the run.
fn boundary(tmax: f64, pacers: &[Pacer]) -> Result<f64, Error> {
    let mut bound = tmax;
    for pacer in pacers {
        bound = bound.min(pacer.next_time()?);
    }
    Ok(bound)
}
