use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Process-wide "a pass is running" flag.
#[derive(Debug, Clone, Default)]
pub(crate) struct SingleFlight {
    running: Arc<AtomicBool>,
}

/// Held for the duration of a pass; clears the flag when dropped, on every
/// exit path.
#[derive(Debug)]
pub(crate) struct FlightGuard {
    running: Arc<AtomicBool>,
}

impl SingleFlight {
    /// Claim the flag, or `None` if another pass holds it.
    pub fn try_acquire(&self) -> Option<FlightGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
