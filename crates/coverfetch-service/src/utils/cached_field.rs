//! A single value which is re-computed once it is older than its time-to-live.

use std::convert::Infallible;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// A lazily computed value with a time-to-live.
///
/// The value is produced on first access and handed out until it is older than the TTL, at which
/// point the next access produces it again. At most one producer runs at any time: concurrent
/// accessors wait for a running producer and then observe its result.
///
/// Time is measured with [`tokio::time::Instant`], so tests can drive the clock with
/// [`tokio::time::pause`].
pub struct CachedField<T> {
    ttl: Duration,
    slot: Mutex<Option<(T, Instant)>>,
}

impl<T: Clone> CachedField<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Returns the current value, producing a new one if it is missing or expired.
    pub fn obtain(&self, producer: impl FnOnce() -> T) -> T {
        match self.try_obtain(|| Ok::<_, Infallible>(producer())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Returns the current value, producing a new one if it is missing or expired.
    ///
    /// A failing producer leaves the field as it was, and the error is handed to the caller.
    /// The next access runs the producer again.
    pub fn try_obtain<E>(&self, producer: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((value, produced_at)) = slot.as_ref()
            && produced_at.elapsed() <= self.ttl
        {
            return Ok(value.clone());
        }

        let value = producer()?;
        *slot = Some((value.clone(), Instant::now()));
        Ok(value)
    }

    /// Returns the last produced value, regardless of its age.
    pub fn peek(&self) -> Option<T> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|(value, _)| value.clone())
    }

    /// Drops the current value, so that the next access produces a new one.
    pub fn invalidate(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<T> fmt::Debug for CachedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedField")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
