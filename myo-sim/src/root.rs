/// A recorded crossing of the root-finding threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    /// Time at which the monitored state crossed the threshold.
    pub time: f64,

    /// +1 when the threshold was approached from below, -1 from above.
    pub direction: i8,
}
