//! The single root context threaded into every start/stop hook and every
//! supervised worker.
//!
//! Per spec.md §5 ("Cancellation"): a single root context is derived at
//! `run` and passed (or a child derived) into every hook and worker.
//! Cancellation propagates downward; nothing here ever blocks except by
//! choice of the caller awaiting `cancelled()`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// The context passed to lifecycle hooks and worker `on_start`/`on_stop`
/// calls.
///
/// Wraps a [`CancellationToken`] (the idiomatic Tokio-ecosystem
/// cancellation primitive) rather than a hand-rolled atomic flag, so hooks
/// can `tokio::select!` against `cancelled()` directly.
#[derive(Clone, Debug)]
pub struct HookContext {
    token: CancellationToken,
}

impl HookContext {
    /// Creates a fresh root context with its own cancellation token.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Derives a child context. Cancelling the parent cancels the child;
    /// cancelling the child alone does not affect the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Requests cancellation of this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True if this context (or an ancestor) has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this context is cancelled. Intended for use inside
    /// `tokio::select!` alongside the hook's own work.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Runs `fut` to completion, or returns `None` if `timeout` elapses or
    /// this context is cancelled first.
    pub async fn run_bounded<F, T>(&self, timeout: Duration, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            result = tokio::time::timeout(timeout, fut) => result.ok(),
            _ = self.cancelled() => None,
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for HookContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_cancelled_when_parent_cancelled() {
        let parent = HookContext::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn run_bounded_returns_none_on_cancel() {
        let ctx = HookContext::new();
        ctx.cancel();
        let result = ctx
            .run_bounded(Duration::from_secs(5), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                42
            })
            .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn run_bounded_returns_value_on_completion() {
        let ctx = HookContext::new();
        let result = ctx.run_bounded(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Some(7));
    }
}
