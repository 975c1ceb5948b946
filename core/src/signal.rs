//! Shutdown flag and close signal shared between the engine and its worker.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Cooperative "worker should stop" flag, checked once per worker iteration.
#[derive(Debug, Default)]
pub struct ShutdownFlag {
    value: Mutex<bool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn request(&self) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn is_set(&self) -> bool {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Broadcast by the worker once it has left its loop.
///
/// The broadcast is latched: a waiter arriving after the worker exited
/// returns immediately instead of sleeping forever.
#[derive(Debug, Default)]
pub struct CloseSignal {
    closed: Mutex<bool>,
    cond: Condvar,
}

impl CloseSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broadcast(&self) {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the broadcast arrives or `timeout` elapses.
    ///
    /// `None`, or a bound too large to express as a deadline, waits
    /// indefinitely. Returns whether the signal was received.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut closed = self.closed.lock().unwrap_or_else(PoisonError::into_inner);
        while !*closed {
            match deadline {
                None => {
                    closed = self.cond.wait(closed).unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    closed = self
                        .cond
                        .wait_timeout(closed, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        true
    }
}
