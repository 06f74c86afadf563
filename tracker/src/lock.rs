use std::fmt::Debug;

use parking_lot::Mutex;

/// A `parking_lot::Mutex` that never exposes the poisoning story `std`'s
/// does. Used for the process-global shared resources §5 calls out (Pacer
/// counters, Breaker state, the cookie jar, `lastAcquireAt`) — all of them
/// are cheap, held-briefly values, never held across an `.await`.
#[derive(Debug, Default)]
pub struct SharedState<T>(Mutex<T>);

impl<T> SharedState<T> {
    pub fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.lock())
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.lock().clone()
    }

    pub fn set(&self, value: T) {
        *self.0.lock() = value;
    }
}
