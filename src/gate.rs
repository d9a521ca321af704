use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared advisory flag marking "an actuation command is in flight".
///
/// Cloned handles share one flag. The poller reads it before each tick and
/// skips the tick when it is set; it never blocks on it. The gate does not
/// order actuation commands against each other, the device link's request
/// channel does that.
#[derive(Debug, Clone, Default)]
pub struct OperationGate {
    engaged: Arc<AtomicBool>,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: bool) {
        self.engaged.store(value, Ordering::SeqCst);
    }

    /// Set the flag and return a guard that clears it when dropped, so an
    /// early return inside an actuation path cannot leave it stuck.
    pub fn engage(&self) -> OperationGuard {
        self.set(true);
        OperationGuard { gate: self.clone() }
    }
}

pub struct OperationGuard {
    gate: OperationGate,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.gate.set(false);
    }
}
