//! Run/pause flags shared between a runner and its chained children, and
//! the set-points the runner last commanded.

use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation and pause state.
#[derive(Debug)]
pub struct RunFlags {
    running: AtomicBool,
    paused: AtomicBool,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
        }
    }
}

impl RunFlags {
    /// Fresh flags: running, not paused.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether execution may continue.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether execution is parked at the next cancellation point.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Request an abort. Irreversible for this set of flags.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Park execution at the next cancellation point.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Release a pause.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

/// Last commanded values; `None` until first written.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Setpoints {
    /// Temperature set-point in K.
    pub temperature: Option<f64>,
    /// Field set-point in T.
    pub field: Option<f64>,
    /// Sample position set-point.
    pub position: Option<f64>,
    /// Code of the last chamber operation.
    pub chamber: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_start_running() {
        let flags = RunFlags::new();
        assert!(flags.is_running());
        assert!(!flags.is_paused());
    }

    #[test]
    fn pause_and_stop_are_independent() {
        let flags = RunFlags::new();
        flags.pause();
        assert!(flags.is_paused());
        flags.stop();
        assert!(!flags.is_running());
        flags.resume();
        assert!(!flags.is_paused());
        assert!(!flags.is_running());
    }
}
