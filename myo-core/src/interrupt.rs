use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cooperatively polled cancellation signal.
///
/// Long-running loops check the signal at bounded intervals and abort
/// cleanly when it is raised. Cancellation is polled, never asynchronous:
/// nothing is torn down from another thread.
///
/// The `()` impl never raises, and atomic flags can be shared with a
/// controlling thread via [`Arc<AtomicBool>`].
pub trait Interrupt {
    /// Returns whether cancellation has been requested.
    fn is_raised(&self) -> bool;
}

/// Blanket implementation for polling closures.
impl<F> Interrupt for F
where
    F: Fn() -> bool,
{
    fn is_raised(&self) -> bool {
        self()
    }
}

/// A signal that is never raised.
impl Interrupt for () {
    fn is_raised(&self) -> bool {
        false
    }
}

impl Interrupt for AtomicBool {
    fn is_raised(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl Interrupt for Arc<AtomicBool> {
    fn is_raised(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}
