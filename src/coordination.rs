//! Shared flags crossing the host/engine thread boundary.
//!
//! Both flags are plain atomic booleans. Readers poll them; nothing waits on them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A clonable handle to one shared boolean
#[derive(Debug, Clone)]
pub struct SharedFlag(Arc<AtomicBool>);

impl SharedFlag {
    pub fn new(initial: bool) -> Self {
        Self(Arc::new(AtomicBool::new(initial)))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::Relaxed);
    }
}

/// The coordination context passed to both the engine and the monitor
///
/// `suppress` is written by the monitor and read by the engine.
/// `running` is lowered once by the host and read by the engine.
#[derive(Debug, Clone)]
pub struct Coordination {
    suppress: SharedFlag,
    running: SharedFlag,
}

impl Coordination {
    pub fn new() -> Self {
        Self {
            suppress: SharedFlag::new(false),
            running: SharedFlag::new(true),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppress.get()
    }

    pub fn set_suppressed(&self, suppressed: bool) {
        self.suppress.set(suppressed);
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Ask every loop observing this context to stop. Idempotent.
    pub fn request_shutdown(&self) {
        self.running.set(false);
    }
}

impl Default for Coordination {
    fn default() -> Self {
        Self::new()
    }
}
