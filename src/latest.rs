//! Single-slot mailbox that keeps only the newest value.
//!
//! The camera side publishes every frame; the processing loop takes whatever
//! is newest. A value that is overwritten before being taken is counted as
//! dropped, so a slow consumer always works on the freshest frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct SlotState<T> {
    value: Option<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
    published: AtomicU64,
    dropped: AtomicU64,
}

/// Result of waiting on the slot
#[derive(Debug, PartialEq, Eq)]
pub enum Take<T> {
    /// The newest value
    Value(T),
    /// Nothing new arrived within the timeout
    Timeout,
    /// The producer closed the slot and it is empty
    Closed,
}

/// Newest-value slot shared between one producer and one consumer
pub struct LatestSlot<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LatestSlot<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LatestSlot<T> {
    /// Create an empty, open slot
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SlotState {
                    value: None,
                    closed: false,
                }),
                ready: Condvar::new(),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a value, replacing any value not yet taken.
    ///
    /// Returns `false` if the slot has been closed.
    pub fn publish(&self, value: T) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        if state.value.replace(value).is_some() {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.published.fetch_add(1, Ordering::Relaxed);
        drop(state);
        self.shared.ready.notify_one();
        true
    }

    /// Take the newest value without waiting
    pub fn try_take(&self) -> Option<T> {
        self.lock().value.take()
    }

    /// Wait up to `timeout` for a value
    pub fn take_timeout(&self, timeout: Duration) -> Take<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(value) = state.value.take() {
                return Take::Value(value);
            }
            if state.closed {
                return Take::Closed;
            }
            let now = Instant::now();
            if now >= deadline {
                return Take::Timeout;
            }
            state = self
                .shared
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Close the slot; a pending value can still be taken
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.ready.notify_all();
    }

    /// Whether the slot has been closed
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Values published so far
    pub fn published(&self) -> u64 {
        self.shared.published.load(Ordering::Relaxed)
    }

    /// Values overwritten before they were taken
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}
