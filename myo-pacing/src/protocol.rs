use crate::error::ProtocolError;

/// Specification of a single stimulus event.
///
/// A `period` of 0 means the event does not recur. A `multiplier` of 0
/// with a non-zero period means the event recurs indefinitely; a positive
/// multiplier counts the total number of occurrences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSpec {
    /// Stimulus magnitude while the event is active (non-zero).
    pub level: f64,

    /// Time at which the event first starts.
    pub start: f64,

    /// Length of the interval during which the event is active.
    pub duration: f64,

    /// Recurrence interval; 0 for a one-shot event.
    pub period: f64,

    /// Remaining occurrences; 0 means recur indefinitely.
    pub multiplier: u32,
}

/// An ordered list of validated stimulus events.
///
/// A protocol is built once, then handed to
/// [`EventPacing`](crate::EventPacing) for simulation. It is never mutated
/// by the pacing system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Protocol {
    events: Vec<EventSpec>,
}

impl Protocol {
    /// Creates an empty protocol.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a protocol with a single periodic block pulse train.
    ///
    /// The first pulse starts at `offset`; subsequent pulses follow every
    /// `period`. A `multiplier` of 0 repeats indefinitely.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if any argument is invalid.
    pub fn blocktrain(
        level: f64,
        duration: f64,
        offset: f64,
        period: f64,
        multiplier: u32,
    ) -> Result<Self, ProtocolError> {
        let mut protocol = Self::new();
        protocol.schedule(level, offset, duration, period, multiplier)?;
        Ok(protocol)
    }

    /// Schedules an event.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the event is malformed or if another
    /// event already starts at the same time (ambiguous ordering).
    pub fn schedule(
        &mut self,
        level: f64,
        start: f64,
        duration: f64,
        period: f64,
        multiplier: u32,
    ) -> Result<(), ProtocolError> {
        if level == 0.0 || !level.is_finite() {
            return Err(ProtocolError::ZeroLevel);
        }
        if !start.is_finite() {
            return Err(ProtocolError::NonFiniteStart(start));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(ProtocolError::InvalidDuration(duration));
        }
        if !period.is_finite() || period < 0.0 {
            return Err(ProtocolError::InvalidPeriod(period));
        }
        if multiplier > 0 && period == 0.0 {
            return Err(ProtocolError::MultiplierWithoutPeriod(multiplier));
        }
        if self.events.iter().any(|e| e.start == start) {
            return Err(ProtocolError::SimultaneousEvent(start));
        }

        self.events.push(EventSpec {
            level,
            start,
            duration,
            period,
            multiplier,
        });
        Ok(())
    }

    /// The scheduled events, in insertion order.
    #[must_use]
    pub fn events(&self) -> &[EventSpec] {
        &self.events
    }

    /// Returns whether any event recurs indefinitely.
    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.events
            .iter()
            .any(|e| e.period > 0.0 && e.multiplier == 0)
    }

    /// The time after which no further event is active, or `None` when
    /// the protocol recurs indefinitely or holds no events.
    #[must_use]
    pub fn ends(&self) -> Option<f64> {
        if self.is_infinite() {
            return None;
        }
        self.events
            .iter()
            .map(|e| {
                let recurrences = if e.period == 0.0 {
                    0.0
                } else {
                    f64::from(e.multiplier - 1)
                };
                e.start + recurrences * e.period + e.duration
            })
            .fold(None, |acc: Option<f64>, end| {
                Some(acc.map_or(end, |a| a.max(end)))
            })
    }
}
