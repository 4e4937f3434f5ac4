use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// An active call. Lives from the first sign of the call until its summary
/// arrives.
#[derive(Debug)]
pub struct CallSession {
    call_id: String,
    started_at: DateTime<Utc>,
    pending: AtomicUsize,
    opened: Instant,
    /// Milliseconds after `opened` of the last start, invocation, or
    /// invocation finish.
    last_active_ms: AtomicU64,
}

impl CallSession {
    pub(crate) fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            started_at: Utc::now(),
            pending: AtomicUsize::new(0),
            opened: Instant::now(),
            last_active_ms: AtomicU64::new(0),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Invocations currently running for this call.
    pub fn pending_invocations(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Time since the call last showed activity, as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        let last_ms = self.last_active_ms.load(Ordering::Relaxed);
        now.saturating_duration_since(self.opened + Duration::from_millis(last_ms))
    }

    pub(crate) fn touch(&self) {
        let elapsed = u64::try_from(self.opened.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Idle sessions with nothing running can be dropped.
    pub(crate) fn is_expired(&self, now: Instant, idle_ttl: Duration) -> bool {
        self.pending_invocations() == 0 && self.idle_for(now) >= idle_ttl
    }

    pub(crate) fn track(self: &Arc<Self>) -> PendingGuard {
        self.touch();
        self.pending.fetch_add(1, Ordering::SeqCst);
        PendingGuard {
            session: Arc::clone(self),
        }
    }
}

/// Decrements the pending count when the invocation finishes, however it
/// finishes.
pub(crate) struct PendingGuard {
    session: Arc<CallSession>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.session.touch();
        self.session.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_tracks_pending() {
        let session = Arc::new(CallSession::new("c1"));
        let first = session.track();
        let second = session.track();
        assert_eq!(session.pending_invocations(), 2);
        drop(first);
        assert_eq!(session.pending_invocations(), 1);
        drop(second);
        assert_eq!(session.pending_invocations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_needs_idle_time_and_no_pending_work() {
        let ttl = Duration::from_secs(60);
        let session = Arc::new(CallSession::new("c1"));
        assert!(!session.is_expired(Instant::now(), ttl));

        tokio::time::advance(Duration::from_secs(45)).await;
        session.touch();
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(!session.is_expired(Instant::now(), ttl));

        let running = session.track();
        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(!session.is_expired(Instant::now(), ttl));

        drop(running);
        assert!(!session.is_expired(Instant::now(), ttl));
        tokio::time::advance(ttl).await;
        assert!(session.is_expired(Instant::now(), ttl));
    }
}
