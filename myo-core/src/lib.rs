//! Core traits and types for the Myo framework.
//!
//! This crate defines the shared abstractions that the pacing subsystem,
//! the simulation stepper, and user-supplied collaborators build on:
//!
//! - [`CellModel`] — a generated cell model exposing derivative,
//!   intermediate, and sensitivity evaluation
//! - [`Solver`] — an adaptive ODE/DAE integrator with single-step advance,
//!   dense output, and reinitialization
//! - [`Observer`] — receives stepper events and optionally returns control
//!   actions
//! - [`Interrupt`] — a cooperatively polled cancellation signal
//! - [`Sink`] — an append-only sequence of sampled values
//! - [`time`] — scale-relative tolerant comparisons for event times

mod bound;
mod interrupt;
mod model;
mod observer;
mod sink;
mod solver;
pub mod time;

pub use bound::BoundVariables;
pub use interrupt::Interrupt;
pub use model::CellModel;
pub use observer::Observer;
pub use sink::Sink;
pub use solver::{RootSpec, Solver, StepResult};
