//! Cooperative cancellation signals.
//!
//! A `CancelSignal` is an externally settable flag that the orchestrator
//! reads synchronously between units of work. Work already in progress is
//! never interrupted. Unlike a bare `CancellationToken`, a signal can be
//! reset so a cancelled run can be started again.

use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

/// A resettable cancellation flag.
#[derive(Debug, Default)]
pub struct CancelSignal {
    token: RwLock<CancellationToken>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.current().cancel();
    }

    /// Whether cancellation has been requested since the last reset.
    pub fn is_cancelled(&self) -> bool {
        self.current().is_cancelled()
    }

    /// Clear the flag by swapping in a fresh token.
    ///
    /// Tokens handed out before the reset keep their old state.
    pub fn reset(&self) {
        let mut guard = match self.token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = CancellationToken::new();
    }

    /// The token backing the signal right now, for `select!`-style waiting.
    pub fn token(&self) -> CancellationToken {
        self.current()
    }

    fn current(&self) -> CancellationToken {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// The independent cancellation scopes shared by the orchestrators.
///
/// `pipeline` stops the sequential step run, `queue_run` stops bulk queue
/// iteration between items, and `operations` is the finer sub-scope handed
/// to item executors.
#[derive(Debug, Clone, Default)]
pub struct CancellationScopes {
    pub pipeline: Arc<CancelSignal>,
    pub queue_run: Arc<CancelSignal>,
    pub operations: Arc<CancelSignal>,
}

impl CancellationScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every scope.
    pub fn reset_all(&self) {
        self.pipeline.reset();
        self.queue_run.reset();
        self.operations.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_then_reset() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());

        signal.cancel();
        assert!(signal.is_cancelled());

        signal.reset();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn token_handed_out_before_reset_stays_cancelled() {
        let signal = CancelSignal::new();
        let token = signal.token();
        signal.cancel();
        signal.reset();

        assert!(token.is_cancelled());
        assert!(!signal.token().is_cancelled());
    }

    #[test]
    fn scopes_are_independent() {
        let scopes = CancellationScopes::new();
        scopes.queue_run.cancel();

        assert!(scopes.queue_run.is_cancelled());
        assert!(!scopes.pipeline.is_cancelled());
        assert!(!scopes.operations.is_cancelled());

        let clone = scopes.clone();
        clone.pipeline.cancel();
        assert!(scopes.pipeline.is_cancelled());

        scopes.reset_all();
        assert!(!scopes.pipeline.is_cancelled());
        assert!(!scopes.queue_run.is_cancelled());
    }

    #[tokio::test]
    async fn token_wakes_waiters() {
        let signal = Arc::new(CancelSignal::new());
        let token = signal.token();
        let waiter = tokio::spawn(async move { token.cancelled().await });

        signal.cancel();
        waiter.await.unwrap();
    }
}
