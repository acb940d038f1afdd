use crate::error::TimeSeriesError;

/// Pacing by linear interpolation over a monotonic time/value table.
///
/// Queries before the first timestamp clamp to the first value, queries
/// after the last clamp to the last. Lookups remember the bracket of the
/// previous query, so monotonically increasing query sequences resolve in
/// near-constant time; the hint is a speed optimization only and never
/// affects the returned value.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPacing {
    times: Vec<f64>,
    values: Vec<f64>,
    /// Left index of the most recently resolved bracket.
    last_index: usize,
}

impl TimeSeriesPacing {
    /// Creates a system from a time/value table.
    ///
    /// # Errors
    ///
    /// Returns a [`TimeSeriesError`] if the vectors differ in length, hold
    /// fewer than two points, or the times are not finite and
    /// non-decreasing.
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Result<Self, TimeSeriesError> {
        if times.len() != values.len() {
            return Err(TimeSeriesError::SizeMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        if times.len() < 2 {
            return Err(TimeSeriesError::NotEnoughData(times.len()));
        }
        for (i, &t) in times.iter().enumerate() {
            if !t.is_finite() {
                return Err(TimeSeriesError::NonFiniteTime(i));
            }
            if i > 0 && t < times[i - 1] {
                return Err(TimeSeriesError::DecreasingTimes(i));
            }
        }

        Ok(Self {
            times,
            values,
            last_index: 0,
        })
    }

    /// Returns the pacing level at time `t`.
    pub fn level_at(&mut self, t: f64) -> f64 {
        let n = self.times.len();
        if t <= self.times[0] {
            return self.values[0];
        }
        if t >= self.times[n - 1] {
            return self.values[n - 1];
        }

        // Seed the bisection from the previous bracket when it is still
        // valid; sequential forward queries then resolve immediately.
        let mut lo = 0;
        let mut hi = n - 1;
        if self.last_index < n - 1 {
            if self.times[self.last_index] <= t {
                lo = self.last_index;
                if t <= self.times[self.last_index + 1] {
                    hi = self.last_index + 1;
                }
            } else {
                hi = self.last_index;
            }
        }

        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.times[mid] <= t {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        self.last_index = lo;

        let (t_left, t_right) = (self.times[lo], self.times[hi]);
        // Exact hits on the right endpoint avoid the division, which keeps
        // duplicate timestamps from producing 0/0.
        if t == t_right {
            return self.values[hi];
        }
        self.values[lo] + (self.values[hi] - self.values[lo]) * (t - t_left) / (t_right - t_left)
    }
}
