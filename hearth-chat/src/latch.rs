//! Single-use completion latch.

use std::sync::atomic::{AtomicBool, Ordering};

/// Guards a "stream finished" signal that two code paths may race to send.
///
/// The first call to [`FinishOnce::try_finish`] returns `true`; every later
/// call, from any thread, returns `false`.
#[derive(Debug, Default)]
pub struct FinishOnce {
    finished: AtomicBool,
}

impl FinishOnce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_finish(&self) -> bool {
        self.finished
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Run `finish` only if this is the first completion.
    pub fn finish_with<F: FnOnce()>(&self, finish: F) -> bool {
        let first = self.try_finish();
        if first {
            finish();
        }
        first
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}
