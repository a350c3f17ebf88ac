//! Local feedback when a round outcome arrives.
//!
//! Anything physical (a lamp, a buzzer) lives behind [`SignalHooks`]; the
//! receive loop only decides when to fire them.

use log::info;

pub trait SignalHooks: Send + Sync {
    /// Somebody guessed the secret word.
    fn on_correct_signal(&self);
    /// A guess missed.
    fn on_wrong_signal(&self);
}

/// Hooks that only write to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSignals;

impl SignalHooks for LogSignals {
    fn on_correct_signal(&self) {
        info!("*** correct ***");
    }

    fn on_wrong_signal(&self) {
        info!("*** wrong ***");
    }
}

impl<T: SignalHooks + ?Sized> SignalHooks for std::sync::Arc<T> {
    fn on_correct_signal(&self) {
        (**self).on_correct_signal();
    }

    fn on_wrong_signal(&self) {
        (**self).on_wrong_signal();
    }
}
