//! Cooperative cancellation shared between the UI side and the read loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A one-shot cancellation flag.
///
/// Clones share the same flag. The flag can be set once; every later call to
/// [`CancellationToken::cancel`] is a no-op. Readers either poll
/// [`CancellationToken::is_cancelled`] between units of work or await
/// [`CancellationToken::cancelled`] alongside a pending read so the read can be
/// dropped as soon as the flag is set.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every task waiting in [`Self::cancelled`].
    ///
    /// Returns true if this call set the flag, false if it was already set.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// Returns true once the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a cancel between the check and the
            // await still wakes us.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Returns true if both tokens share the same flag.
    pub fn same_as(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
