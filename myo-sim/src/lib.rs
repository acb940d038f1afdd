//! Event-driven simulation stepper for the Myo framework.
//!
//! A [`Simulation`] advances a cell model and an adaptive integrator from a
//! start time to an end time, interleaving continuous-time integration with
//! the discrete boundaries reported by its pacing systems. Between
//! boundaries the integrator runs freely; at each boundary the solution is
//! reconciled through dense output and the integrator is reinitialized, so
//! it never assumes smoothness across a stimulus discontinuity.
//!
//! Along the way the stepper produces a precisely time-aligned
//! [`SimulationLog`]: every time point the integrator visits
//! ([`LogSpec::Dynamic`]), a fixed grid ([`LogSpec::Periodic`]), or an
//! explicit list ([`LogSpec::Points`]), with optional forward-sensitivity
//! matrices per logged point and threshold-crossing records.
//!
//! The loop is single-threaded and cooperative: [`Simulation::step`]
//! returns control after a bounded number of integrator steps, and both the
//! stepper and the pacing boundary loops poll an
//! [`Interrupt`](myo_core::Interrupt) at bounded intervals.

mod action;
mod config;
mod error;
mod event;
mod log;
mod root;
mod settings;
mod simulation;
mod solution;

pub use action::Action;
pub use config::{Config, ConfigError};
pub use error::Error;
pub use event::Event;
pub use log::{LogSelection, LogSpec, LogSpecError, SimulationLog};
pub use myo_core::RootSpec;
pub use root::Crossing;
pub use settings::Settings;
pub use simulation::Simulation;
pub use solution::{Outcome, Progress, SensitivityMatrix, Status};
