//! A value which is supplied at some point after its readers are created.

use std::fmt;
use std::pin::pin;
use std::sync::OnceLock;

use tokio::sync::Notify;

/// A write-once value which readers can wait for.
///
/// Readers calling [`get`](Self::get) before the value is [initialized](Self::initialize) are
/// suspended until it is. Once initialized, reads complete immediately. Waiting does not block
/// the runtime thread.
pub struct DeferredField<T> {
    value: OnceLock<T>,
    notify: Notify,
}

impl<T> Default for DeferredField<T> {
    fn default() -> Self {
        Self {
            value: OnceLock::new(),
            notify: Notify::new(),
        }
    }
}

impl<T: Clone> DeferredField<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the value and wakes up all waiting readers.
    ///
    /// The field can only be initialized once, later calls hand their value back.
    pub fn initialize(&self, value: T) -> Result<(), T> {
        self.value.set(value)?;
        self.notify.notify_waiters();
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }

    /// Returns the value if it was already supplied.
    pub fn try_get(&self) -> Option<T> {
        self.value.get().cloned()
    }

    /// Returns the value, waiting for it to be supplied first if needed.
    pub async fn get(&self) -> T {
        loop {
            let mut notified = pin!(self.notify.notified());
            // Register as a waiter before checking, so an `initialize` in between is not missed.
            notified.as_mut().enable();

            if let Some(value) = self.value.get() {
                return value.clone();
            }

            notified.await;
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DeferredField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredField")
            .field("value", &self.value.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::FutureExt;

    use super::*;

    #[tokio::test]
    async fn test_readers_wait_for_initialization() {
        let field = Arc::new(DeferredField::new());

        let reader = tokio::spawn({
            let field = Arc::clone(&field);
            async move { field.get().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!reader.is_finished());
        assert!(!field.is_initialized());

        field.initialize("X").unwrap();
        assert_eq!(reader.await.unwrap(), "X");

        // once initialized, reads complete without suspending
        assert_eq!(field.get().now_or_never(), Some("X"));
        assert_eq!(field.try_get(), Some("X"));
    }

    #[tokio::test]
    async fn test_initialize_twice() {
        let field = DeferredField::new();

        assert_eq!(field.initialize(1), Ok(()));
        assert_eq!(field.initialize(2), Err(2));
        assert_eq!(field.get().await, 1);
    }

    #[tokio::test]
    async fn test_many_readers() {
        let field = Arc::new(DeferredField::new());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let field = Arc::clone(&field);
                tokio::spawn(async move { field.get().await })
            })
            .collect();

        tokio::task::yield_now().await;
        field.initialize(String::from("cover")).unwrap();

        for reader in readers {
            assert_eq!(reader.await.unwrap(), "cover");
        }
    }
}
