//! Cancellation token for remote management calls.
//!
//! A caller hands a `CancellationToken` to a remote connection; cancelling it
//! makes the in-flight round trip (and every later one) fail with
//! [`ManagementError::Cancelled`](crate::ManagementError::Cancelled) instead
//! of waiting on the peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag. Clones observe the same state, and tasks can
/// either poll it or wait on [`cancelled`](Self::cancelled).
///
/// # Example
///
/// ```
/// use vigil_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let token_clone = token.clone();
///
/// token_clone.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every task waiting in [`cancelled`](Self::cancelled).
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the cancellation state so the token can be reused.
    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Wait until cancellation is requested.
    ///
    /// Returns immediately if the token is already cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel() is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// `Err(CancelledError)` once cancelled.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.is_cancelled() {
            Err(CancelledError)
        } else {
            Ok(())
        }
    }
}

/// Returned by [`CancellationToken::check`] once the token is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Operation was cancelled")]
pub struct CancelledError;

impl From<CancelledError> for crate::error::ManagementError {
    fn from(_: CancelledError) -> Self {
        crate::error::ManagementError::Cancelled
    }
}
