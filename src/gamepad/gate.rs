use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Process-wide "gamepad enabled" flag.
///
/// Closed while a table launch is in flight so the poller ignores buttons
/// during the transition.
#[derive(Clone, Debug)]
pub struct GamepadGate {
    enabled: Arc<AtomicBool>,
}

impl Default for GamepadGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl GamepadGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        debug!("Gamepad input enabled: {}", enabled);
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Closes the gate until the returned guard is dropped
    pub fn suspend(&self) -> GateGuard {
        let previous = self.enabled.swap(false, Ordering::SeqCst);
        debug!("Gamepad input suspended");
        GateGuard {
            gate: self.clone(),
            previous,
        }
    }
}

/// Restores the gate to its state before [`GamepadGate::suspend`] on drop
pub struct GateGuard {
    gate: GamepadGate,
    previous: bool,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.set_enabled(self.previous);
    }
}
