use myo_core::{Interrupt, time};

use crate::error::PacingError;
use crate::event::Event;
use crate::protocol::Protocol;

/// A discrete-event pacing system.
///
/// The system owns its events and maintains a start-time-sorted queue of
/// the ones that have not yet fired, plus at most one currently active
/// event. Advancing the system resolves every event boundary up to the new
/// time; between boundaries the pacing level is constant, which is what
/// lets a stepper bound its integration intervals at [`next_time`].
///
/// Time only moves forward. All boundary comparisons are tolerant of
/// floating-point round-off from accumulated period arithmetic (see
/// [`myo_core::time`]); exact comparison would miss or duplicate events.
///
/// [`next_time`]: EventPacing::next_time
#[derive(Debug, Clone)]
pub struct EventPacing {
    initial_time: f64,
    time: f64,
    events: Vec<Event>,
    /// Sorted queue of not-yet-started events (index of the first).
    head: Option<usize>,
    /// The currently active event, if any.
    firing: Option<usize>,
    /// Time of the next event boundary.
    tnext: f64,
    /// Time at which the active event stops.
    tdown: f64,
    /// Current pacing level.
    level: f64,
    populated: bool,
}

impl EventPacing {
    /// Creates an unpopulated system at `initial_time`.
    #[must_use]
    pub fn new(initial_time: f64) -> Self {
        Self {
            initial_time,
            time: initial_time,
            events: Vec::new(),
            head: None,
            firing: None,
            tnext: f64::INFINITY,
            tdown: f64::INFINITY,
            level: 0.0,
            populated: false,
        }
    }

    /// Creates a populated system from a protocol.
    ///
    /// # Errors
    ///
    /// Returns a [`PacingError`] if the queue cannot be built.
    pub fn from_protocol(initial_time: f64, protocol: &Protocol) -> Result<Self, PacingError> {
        let mut system = Self::new(initial_time);
        system.populate(protocol)?;
        Ok(system)
    }

    /// Populates the system from a protocol. May be called once.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::AlreadyPopulated`] on a second call.
    pub fn populate(&mut self, protocol: &Protocol) -> Result<(), PacingError> {
        if self.populated {
            return Err(PacingError::AlreadyPopulated);
        }
        self.events = protocol.events().iter().copied().map(Event::from).collect();
        self.populated = true;
        self.reset()
    }

    /// Restores all events to their scheduled start, period, and
    /// multiplier and rebuilds the queue, leaving the system at its
    /// initial time with no event fired yet.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::Unpopulated`] before [`populate`], or
    /// [`PacingError::SimultaneousEvent`] if two events share a start.
    ///
    /// [`populate`]: EventPacing::populate
    pub fn reset(&mut self) -> Result<(), PacingError> {
        self.ensure_populated()?;
        for event in &mut self.events {
            event.restore();
        }
        self.head = None;
        self.firing = None;
        self.time = self.initial_time;
        self.level = 0.0;
        self.tdown = f64::INFINITY;
        for idx in 0..self.events.len() {
            self.schedule(idx)?;
        }
        self.tnext = match self.head {
            Some(h) => self.events[h].start,
            None => f64::INFINITY,
        };
        Ok(())
    }

    /// Advances the system to `new_time`, resolving every event boundary
    /// on the way, and returns the pacing level at `new_time`.
    ///
    /// The boundary loop polls `interrupt` on every iteration and aborts
    /// with [`PacingError::Interrupted`] when it is raised.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::NegativeTimeIncrement`] when `new_time` lies
    /// before the current time, [`PacingError::SimultaneousEvent`] when a
    /// recurring event lands on another event's start, or
    /// [`PacingError::Interrupted`].
    pub fn advance_to<I: Interrupt>(
        &mut self,
        new_time: f64,
        interrupt: &I,
    ) -> Result<f64, PacingError> {
        self.ensure_populated()?;
        if new_time < self.time {
            return Err(PacingError::NegativeTimeIncrement {
                from: self.time,
                to: new_time,
            });
        }

        while time::geq(new_time, self.tnext) {
            if interrupt.is_raised() {
                return Err(PacingError::Interrupted);
            }

            // Stop the active event once its down time is reached.
            if self.firing.is_some() && time::geq(self.tnext, self.tdown) {
                self.firing = None;
                self.level = 0.0;
            }

            // Start the next queued event.
            if let Some(idx) = self.head {
                if time::geq(self.tnext, self.events[idx].start) {
                    self.head = self.events[idx].next;
                    self.events[idx].next = None;
                    self.firing = Some(idx);
                    self.tdown = self.events[idx].start + self.events[idx].duration;
                    self.level = self.events[idx].level;

                    // Requeue a recurring event at its next start. A
                    // multiplier of exactly 1 means this was the final
                    // occurrence.
                    let event = &mut self.events[idx];
                    if event.period != 0.0 {
                        if event.multiplier == 1 {
                            event.period = 0.0;
                        } else {
                            if event.multiplier > 1 {
                                event.multiplier -= 1;
                            }
                            event.start += event.period;
                            self.schedule(idx)?;
                        }
                    }

                    // Round-off between an accumulated down time and an
                    // independently scheduled start would create a
                    // degenerate zero-length interval; snap them together.
                    if let Some(h) = self.head {
                        if time::eq(self.tdown, self.events[h].start) {
                            self.tdown = self.events[h].start;
                        }
                    }
                }
            }

            self.tnext = f64::INFINITY;
            if self.firing.is_some() {
                self.tnext = self.tdown;
            }
            if let Some(h) = self.head {
                if self.events[h].start < self.tnext {
                    self.tnext = self.events[h].start;
                }
            }
        }

        self.time = new_time;
        Ok(self.level)
    }

    /// The time of the next event boundary, or infinity when none remain.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::Unpopulated`] before [`populate`].
    ///
    /// [`populate`]: EventPacing::populate
    pub fn next_time(&self) -> Result<f64, PacingError> {
        self.ensure_populated()?;
        Ok(self.tnext)
    }

    /// The pacing level at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`PacingError::Unpopulated`] before [`populate`].
    ///
    /// [`populate`]: EventPacing::populate
    pub fn level(&self) -> Result<f64, PacingError> {
        self.ensure_populated()?;
        Ok(self.level)
    }

    /// The time the system was last advanced to.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Inserts event `idx` into the queue by start time, keeping the queue
    /// consistent even when a collision is reported.
    fn schedule(&mut self, idx: usize) -> Result<(), PacingError> {
        let start = self.events[idx].start;
        let mut clash = false;
        let mut prev: Option<usize> = None;
        let mut cursor = self.head;

        while let Some(c) = cursor {
            if self.events[c].start > start {
                break;
            }
            if self.events[c].start == start {
                clash = true;
            }
            prev = Some(c);
            cursor = self.events[c].next;
        }

        self.events[idx].next = cursor;
        match prev {
            None => self.head = Some(idx),
            Some(p) => self.events[p].next = Some(idx),
        }

        if clash {
            return Err(PacingError::SimultaneousEvent(start));
        }
        Ok(())
    }

    fn ensure_populated(&self) -> Result<(), PacingError> {
        if self.populated {
            Ok(())
        } else {
            Err(PacingError::Unpopulated)
        }
    }
}
