/// Event emitted by a running simulation after each cooperative batch of
/// integrator steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Current simulation time.
    pub time: f64,

    /// Total integrator steps taken so far.
    pub steps: usize,
}
