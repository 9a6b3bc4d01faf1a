//! Synchronization primitives.
//!
//! Async-aware locks and channels come straight from `tokio::sync`, and
//! cancellation tokens from `tokio_util`. On top of those this module adds
//! [`SingleFlight`], a non-blocking "one operation at a time" guard used by the
//! cache sweep and the offline sync engine.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{Mutex, SingleFlight};
//!
//! async fn example() {
//!     let mutex = Mutex::new(42);
//!     *mutex.lock().await += 1;
//!
//!     let flight = SingleFlight::new();
//!     let guard = flight.try_acquire().expect("idle");
//!     assert!(flight.try_acquire().is_none());
//!     drop(guard);
//!     assert!(!flight.is_held());
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Barrier, Mutex, MutexGuard, Notify, OwnedMutexGuard,
    OwnedSemaphorePermit, RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
};
pub use tokio_util::sync::CancellationToken;

/// A try-lock that admits at most one holder.
///
/// Unlike a mutex, contenders never wait: [`try_acquire`](Self::try_acquire)
/// either hands out the guard or returns `None` immediately. The guard releases
/// on drop, so early returns, `?` propagation and panics all free the flight.
#[derive(Debug, Default)]
pub struct SingleFlight {
    held: AtomicBool,
}

impl SingleFlight {
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Attempts to take the flight without waiting.
    pub fn try_acquire(&self) -> Option<SingleFlightGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SingleFlightGuard { flight: self })
    }

    /// Whether some caller currently holds the flight.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// RAII guard returned by [`SingleFlight::try_acquire`].
#[must_use = "the flight is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SingleFlightGuard<'a> {
    flight: &'a SingleFlight,
}

impl Drop for SingleFlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn second_acquire_is_rejected_until_release() {
        let flight = SingleFlight::new();
        let guard = flight.try_acquire();
        assert!(guard.is_some());
        assert!(flight.is_held());
        assert!(flight.try_acquire().is_none());

        drop(guard);
        assert!(!flight.is_held());
        assert!(flight.try_acquire().is_some());
    }

    #[test]
    fn guard_released_on_panic() {
        let flight = Arc::new(SingleFlight::new());
        let cloned = flight.clone();
        let outcome = std::thread::spawn(move || {
            let _guard = cloned.try_acquire().unwrap();
            panic!("boom");
        })
        .join();

        assert!(outcome.is_err());
        assert!(!flight.is_held());
    }

    #[test]
    fn only_one_thread_wins_a_race() {
        let flight = Arc::new(SingleFlight::new());
        let barrier = Arc::new(std::sync::Barrier::new(8));
        let winners = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let flight = flight.clone();
                let barrier = barrier.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if let Some(guard) = flight.try_acquire() {
                        winners.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        drop(guard);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert!(winners.load(Ordering::SeqCst) >= 1);
        assert!(!flight.is_held());
    }
}
