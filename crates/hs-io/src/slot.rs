//! One-slot, last-write-wins channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared cell behind a [`SlotWriter`] / [`SlotReader`] pair.
///
/// Holds at most one value. Writing over an unread value replaces it and
/// bumps the dropped counter; reading takes the value out. The lock is held
/// only for the swap itself, never across user code.
#[derive(Debug)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl<T> LatestSlot<T> {
    /// Create a slot and split it into its two endpoints.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (SlotWriter<T>, SlotReader<T>) {
        let shared = Arc::new(LatestSlot {
            value: Mutex::new(None),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        (
            SlotWriter {
                shared: shared.clone(),
            },
            SlotReader { shared },
        )
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // A panic while holding the lock cannot leave the Option half-written.
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer endpoint. `put` never blocks on the reader.
#[derive(Debug)]
pub struct SlotWriter<T> {
    shared: Arc<LatestSlot<T>>,
}

impl<T> SlotWriter<T> {
    /// Store `value`, replacing any value the reader has not taken yet.
    pub fn put(&self, value: T) {
        let replaced = self.shared.lock().replace(value);
        if replaced.is_some() {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// True once the reader has been dropped.
    pub fn is_closed(&self) -> bool {
        Arc::strong_count(&self.shared) < 2
    }
}

impl<T> Drop for SlotWriter<T> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}

/// Consumer endpoint.
#[derive(Debug)]
pub struct SlotReader<T> {
    shared: Arc<LatestSlot<T>>,
}

impl<T> SlotReader<T> {
    /// Take the newest unseen value, if any.
    pub fn take(&self) -> Option<T> {
        self.shared.lock().take()
    }

    /// Number of values overwritten before they were read.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// True once the writer has been dropped. A pending value may remain.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}
