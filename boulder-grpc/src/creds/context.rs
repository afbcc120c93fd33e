//! Caller-owned bounds on a client handshake.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::CredsError;

/// Cancellation token plus optional deadline, observed by
/// [`ClientCredentials::client_handshake`](super::ClientCredentials::client_handshake).
///
/// The context belongs to the caller; the credential observes it for the
/// duration of one handshake and never stores it. A context with no deadline
/// and an untriggered token never interrupts anything.
#[derive(Debug, Clone, Default)]
pub struct HandshakeContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl HandshakeContext {
    /// A context that never fires.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// The token half of the context. Cancel it to abort an in-flight
    /// handshake.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Resolves once the context fires, yielding the error to surface.
    /// Explicit cancellation wins over a simultaneously-expired deadline.
    pub(crate) async fn interrupted(&self) -> CredsError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => CredsError::Canceled,
                _ = tokio::time::sleep_until(deadline) => CredsError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                CredsError::Canceled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_fires() {
        let ctx = HandshakeContext::with_timeout(Duration::from_millis(10));
        let err = ctx.interrupted().await;
        assert!(matches!(err, CredsError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn cancellation_fires() {
        let ctx = HandshakeContext::new();
        ctx.cancellation_token().cancel();
        let err = ctx.interrupted().await;
        assert!(matches!(err, CredsError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_expired_deadline() {
        let ctx = HandshakeContext::with_timeout(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;
        ctx.cancellation_token().cancel();
        let err = ctx.interrupted().await;
        assert!(matches!(err, CredsError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_context_stays_pending() {
        let ctx = HandshakeContext::new();
        let interrupted = ctx.interrupted();
        tokio::pin!(interrupted);
        let raced = tokio::time::timeout(Duration::from_secs(3600), &mut interrupted).await;
        assert!(raced.is_err(), "context without deadline or cancel fired");
    }
}
