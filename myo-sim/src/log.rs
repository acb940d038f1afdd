use thiserror::Error;

use myo_core::{CellModel, Sink};

/// How the stepper chooses its logging time points.
#[derive(Debug, Clone, PartialEq)]
pub enum LogSpec {
    /// Log every time point the integrator actually visits.
    Dynamic,

    /// Log on a fixed grid: `tmin`, `tmin + interval`, and so on.
    Periodic { interval: f64 },

    /// Log at an explicit, non-decreasing list of times.
    Points { times: Vec<f64> },
}

/// Errors that can occur when validating a log spec.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum LogSpecError {
    #[error("log interval must be positive and finite, got {0}")]
    Interval(f64),

    #[error("log time at index {0} is not finite")]
    NonFiniteTime(usize),

    #[error("log time at index {0} decreases")]
    DecreasingTimes(usize),
}

impl LogSpec {
    pub(crate) fn validate(&self) -> Result<(), LogSpecError> {
        match self {
            Self::Dynamic => Ok(()),
            Self::Periodic { interval } => {
                if interval.is_finite() && *interval > 0.0 {
                    Ok(())
                } else {
                    Err(LogSpecError::Interval(*interval))
                }
            }
            Self::Points { times } => {
                for (i, &t) in times.iter().enumerate() {
                    if !t.is_finite() {
                        return Err(LogSpecError::NonFiniteTime(i));
                    }
                    if i > 0 && t < times[i - 1] {
                        return Err(LogSpecError::DecreasingTimes(i));
                    }
                }
                Ok(())
            }
        }
    }
}

/// Which classes of variables appear in the log.
///
/// Columns always appear in a fixed order: states, then derivatives, then
/// bound variables, then intermediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSelection {
    pub states: bool,
    pub derivatives: bool,
    pub bound: bool,
    pub intermediates: bool,
}

impl Default for LogSelection {
    fn default() -> Self {
        Self {
            states: true,
            derivatives: false,
            bound: true,
            intermediates: false,
        }
    }
}

impl LogSelection {
    /// Selects every variable class.
    #[must_use]
    pub fn all() -> Self {
        Self {
            states: true,
            derivatives: true,
            bound: true,
            intermediates: true,
        }
    }

    /// Selects only the state variables.
    #[must_use]
    pub fn states_only() -> Self {
        Self {
            states: true,
            derivatives: false,
            bound: false,
            intermediates: false,
        }
    }
}

/// The column names for a model under a selection, in logging order.
pub(crate) fn column_names<M: CellModel>(model: &M, selection: LogSelection) -> Vec<String> {
    let mut names = Vec::new();
    if selection.states {
        names.extend(model.state_names());
    }
    if selection.derivatives {
        names.extend(model.state_names().into_iter().map(|n| format!("dot({n})")));
    }
    if selection.bound {
        names.extend(["time", "pace", "realtime", "evals"].map(String::from));
    }
    if selection.intermediates {
        names.extend(model.intermediate_names());
    }
    names
}

#[derive(Debug, Clone)]
struct Column<K> {
    name: String,
    sink: K,
}

/// A time-aligned log of named value sequences.
///
/// The stepper appends one value per column per logged time point, through
/// the [`Sink`] capability of the backing storage. The default backing is
/// `Vec<f64>`.
#[derive(Debug, Clone)]
pub struct SimulationLog<K: Sink = Vec<f64>> {
    columns: Vec<Column<K>>,
    rows: usize,
}

impl<K: Sink + Default> SimulationLog<K> {
    /// Creates an empty log with one column per selected variable of the
    /// model.
    #[must_use]
    pub fn for_model<M: CellModel>(model: &M, selection: LogSelection) -> Self {
        let columns = column_names(model, selection)
            .into_iter()
            .map(|name| Column {
                name,
                sink: K::default(),
            })
            .collect();
        Self { columns, rows: 0 }
    }
}

impl<K: Sink> SimulationLog<K> {
    /// The column names, in logging order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of logged time points.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Returns whether the log holds no time points yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub(crate) fn matches_columns(&self, names: &[String]) -> bool {
        self.columns.len() == names.len()
            && self
                .columns
                .iter()
                .zip(names)
                .all(|(c, name)| c.name == *name)
    }

    pub(crate) fn append_row(&mut self, row: &[f64]) {
        debug_assert_eq!(row.len(), self.columns.len());
        for (column, &value) in self.columns.iter_mut().zip(row) {
            column.sink.append(value);
        }
        self.rows += 1;
    }
}

impl SimulationLog<Vec<f64>> {
    /// The logged values of the named column.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.sink.as_slice())
    }
}
