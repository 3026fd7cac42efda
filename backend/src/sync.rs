//! Readiness synchronization for device memory.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

/// One-shot readiness latch attached to a device allocation.
///
/// Memory is created pending; whatever produces its contents (a host
/// transfer or a program execution) flips it ready exactly once. Waiters
/// block the calling OS thread — there is no cooperative suspension at this
/// layer.
#[derive(Debug)]
pub struct ReadyEvent {
    ready: AtomicBool,
    /// Protects nothing, exists for the condvar.
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl ReadyEvent {
    pub fn pending() -> Self {
        Self { ready: AtomicBool::new(false), mutex: Mutex::new(()), condvar: Condvar::new() }
    }

    pub fn ready() -> Self {
        Self { ready: AtomicBool::new(true), mutex: Mutex::new(()), condvar: Condvar::new() }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Mark the producing work complete and wake all waiters.
    pub fn set_ready(&self) {
        // Holding the lock closes the window between a waiter's readiness
        // check and its condvar wait.
        let _guard = self.mutex.lock();
        self.ready.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    /// Block until the producing work completes.
    pub fn wait(&self) {
        // Fast path: already ready.
        if self.ready.load(Ordering::Acquire) {
            return;
        }

        let mut guard = self.mutex.lock();
        while !self.ready.load(Ordering::Acquire) {
            self.condvar.wait(&mut guard);
        }
    }
}
