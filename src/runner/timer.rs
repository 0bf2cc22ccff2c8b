//! Cancellable one-shot timer backed by a short-lived thread.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct TimerState {
    cancelled: bool,
    finished: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// A timer thread that finishes after a fixed duration unless cancelled.
///
/// Dropping the timer cancels and joins it.
#[derive(Debug)]
pub struct Timer {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    /// Start a timer that expires after `duration`.
    pub fn start(duration: Duration) -> Self {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            let deadline = Instant::now() + duration;
            let mut state = worker.state.lock();
            while !state.cancelled {
                if worker.wake.wait_until(&mut state, deadline).timed_out() {
                    break;
                }
            }
            state.finished = true;
        });
        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Whether the timer thread has exited.
    pub fn is_finished(&self) -> bool {
        self.shared.state.lock().finished
    }

}

impl Drop for Timer {
    fn drop(&mut self) {
        self.shared.state.lock().cancelled = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_expires() {
        let timer = Timer::start(Duration::from_millis(20));
        let started = Instant::now();
        while !timer.is_finished() {
            assert!(started.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(5));
        }
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn drop_cancels_promptly() {
        let timer = Timer::start(Duration::from_secs(60));
        let started = Instant::now();
        drop(timer);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
