//! Mutex-guarded FIFO shared by callers and the dispatch worker.
//!
//! # Design
//! Every operation takes the lock for exactly as long as it needs it, so a
//! check-then-act sequence (`is_empty` followed by a pop) is never required
//! of callers. Consumers that want to sleep use `pop_wait`, which parks on a
//! condition variable signalled by `push` and `close`.
//!
//! `close` does not reject pushes. It only makes waiters return
//! `Pop::Closed`, which is how the engine wakes a worker parked on an empty
//! queue during shutdown.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Result of a blocking pop.
#[derive(Debug, PartialEq, Eq)]
pub enum Pop<T> {
    Item(T),
    /// The timeout elapsed with the queue still empty.
    Empty,
    /// The queue was closed while (or before) waiting.
    Closed,
}

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct SyncQueue<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

impl<T> SyncQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail and wake one waiter.
    pub fn push(&self, item: T) {
        self.lock().items.push_back(item);
        self.ready.notify_one();
    }

    /// Remove the oldest element without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Run `f` on the oldest element while holding the lock.
    pub fn front_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().items.front().map(f)
    }

    /// Wait up to `timeout` for an element.
    ///
    /// A closed queue reports `Closed` even if elements remain, so a stopping
    /// consumer leaves the rest for `drain`. A timeout too large to express
    /// as a deadline waits without bound.
    pub fn pop_wait(&self, timeout: Duration) -> Pop<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock();
        loop {
            if state.closed {
                return Pop::Closed;
            }
            if let Some(item) = state.items.pop_front() {
                return Pop::Item(item);
            }
            state = match deadline {
                None => self.ready.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Pop::Empty;
                    }
                    self.ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Mark the queue closed and wake every waiter.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Remove every element in one critical section, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.lock().items.drain(..).collect()
    }
}

impl<T> Default for SyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
