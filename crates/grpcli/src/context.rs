//! The execution context a call runs under.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;

/// Cancellation, deadline, and outgoing metadata for one
/// [`round_trip`](crate::round_trip).
///
/// Cancelling the token (or reaching the deadline) aborts an in-progress
/// dial and the invocation that follows it. Pre-dial hooks receive the
/// context mutably and may add metadata, which is attached to the
/// [`Connection`](grpcli_transport::Connection) the invocation receives.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    metadata: MetadataMap,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Keeps the earlier of the current deadline and `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(earliest(self.deadline, deadline));
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataMap {
        &mut self.metadata
    }

    /// Deadline for dialing: the context deadline, tightened by `timeout`
    /// when it is positive.
    pub(crate) fn dial_deadline(&self, timeout: Duration) -> Option<Instant> {
        if timeout.is_zero() {
            return self.deadline;
        }
        Some(earliest(self.deadline, Instant::now() + timeout))
    }
}

fn earliest(current: Option<Instant>, candidate: Instant) -> Instant {
    current.map_or(candidate, |c| c.min(candidate))
}

/// Whether `deadline` has already passed. A timer for a past instant only
/// fires on the next timer tick, so this is checked before racing one.
pub(crate) fn elapsed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| deadline <= Instant::now())
}

/// Resolves once `deadline` passes; never resolves for `None`.
pub(crate) async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_deadline() {
        let ctx = CallContext::new();
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_cancelled());
        assert!(ctx.metadata().is_empty());
    }

    #[tokio::test]
    async fn test_with_deadline_keeps_earliest() {
        let now = Instant::now();
        let ctx = CallContext::new()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_dial_deadline_zero_timeout_uses_context() {
        let ctx = CallContext::new();
        assert!(ctx.dial_deadline(Duration::ZERO).is_none());

        let deadline = Instant::now() + Duration::from_secs(3);
        let ctx = ctx.with_deadline(deadline);
        assert_eq!(ctx.dial_deadline(Duration::ZERO), Some(deadline));
    }

    #[tokio::test]
    async fn test_dial_deadline_tightened_by_timeout() {
        let far = Instant::now() + Duration::from_secs(3600);
        let ctx = CallContext::new().with_deadline(far);
        let dial = ctx.dial_deadline(Duration::from_secs(1)).unwrap();
        assert!(dial < far);
    }

    #[test]
    fn test_shared_cancellation_token() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancellation(token.clone());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_elapsed() {
        assert!(!elapsed(None));
        assert!(elapsed(Some(Instant::now())));
        assert!(!elapsed(Some(Instant::now() + Duration::from_secs(60))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_waits_for_deadline() {
        let deadline = Instant::now() + Duration::from_secs(1);
        expired(Some(deadline)).await;
        assert!(Instant::now() >= deadline);
    }
}
