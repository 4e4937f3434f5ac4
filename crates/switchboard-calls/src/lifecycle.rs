//! Per-call sessions and the end-of-call hook.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;
use switchboard_capabilities::{DispatchError, FunctionDispatcher, Invocation};
use switchboard_types::{CallContext, CallSummaryRecord};
use tokio::time::Instant;

use crate::error::PersistenceError;
use crate::session::CallSession;
use crate::store::SummaryStore;

/// How long call state is kept when calls end badly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// An open call with no activity and nothing running for this long is
    /// dropped. Covers calls whose summary never arrives. Zero keeps
    /// sessions until their call ends.
    pub idle_ttl: Duration,
    /// How long an ended call id is remembered, so a late invocation runs
    /// without reopening the call.
    pub ended_ttl: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(60 * 60),
            ended_ttl: Duration::from_secs(10 * 60),
        }
    }
}

#[derive(Default)]
struct CallTable {
    active: HashMap<String, Arc<CallSession>>,
    /// When each recently ended call ended.
    ended: HashMap<String, Instant>,
}

impl CallTable {
    /// Drops expired sessions and forgotten end markers. Returns how many
    /// sessions were dropped.
    fn sweep(&mut self, now: Instant, policy: &SessionPolicy) -> usize {
        let before = self.active.len();
        self.active.retain(|call_id, session| {
            let expired = !policy.idle_ttl.is_zero() && session.is_expired(now, policy.idle_ttl);
            if expired {
                tracing::warn!(
                    call_id = %call_id,
                    idle_s = session.idle_for(now).as_secs(),
                    "call session expired without a summary"
                );
            }
            !expired
        });
        self.ended
            .retain(|_, ended_at| now.saturating_duration_since(*ended_at) < policy.ended_ttl);
        before - self.active.len()
    }

    fn recently_ended(&self, call_id: &str, now: Instant, policy: &SessionPolicy) -> bool {
        self.ended
            .get(call_id)
            .is_some_and(|ended_at| now.saturating_duration_since(*ended_at) < policy.ended_ttl)
    }

    fn open(&mut self, call_id: &str, now: Instant, policy: &SessionPolicy) -> Arc<CallSession> {
        if let Some(session) = self.active.get(call_id) {
            session.touch();
            return Arc::clone(session);
        }
        self.sweep(now, policy);
        self.ended.remove(call_id);
        tracing::info!(call_id, "call started");
        let session = Arc::new(CallSession::new(call_id));
        self.active.insert(call_id.to_string(), Arc::clone(&session));
        session
    }
}

/// Tracks active calls and persists their summaries when they end.
pub struct CallLifecycleManager {
    dispatcher: FunctionDispatcher,
    store: Arc<dyn SummaryStore>,
    policy: SessionPolicy,
    /// Uses `std::sync::RwLock`: every hold is a short map operation that
    /// never spans an `.await`.
    calls: RwLock<CallTable>,
}

impl std::fmt::Debug for CallLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallLifecycleManager")
            .field("active_calls", &self.active_calls())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CallLifecycleManager {
    pub fn new(dispatcher: FunctionDispatcher, store: Arc<dyn SummaryStore>) -> Self {
        Self::with_policy(dispatcher, store, SessionPolicy::default())
    }

    pub fn with_policy(
        dispatcher: FunctionDispatcher,
        store: Arc<dyn SummaryStore>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            dispatcher,
            store,
            policy,
            calls: RwLock::new(CallTable::default()),
        }
    }

    pub fn dispatcher(&self) -> &FunctionDispatcher {
        &self.dispatcher
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Opens a session for `call_id`, or returns the open one unchanged.
    ///
    /// An explicit start reopens a call id that already ended.
    pub fn start_call(&self, call_id: &str) -> Arc<CallSession> {
        if let Some(session) = self.session(call_id) {
            session.touch();
            return session;
        }
        self.write_calls().open(call_id, Instant::now(), &self.policy)
    }

    pub fn session(&self, call_id: &str) -> Option<Arc<CallSession>> {
        self.read_calls().active.get(call_id).cloned()
    }

    pub fn active_calls(&self) -> usize {
        self.read_calls().active.len()
    }

    /// Context for a handler running in `call_id`, if the call is active.
    pub fn context(&self, call_id: &str) -> Option<CallContext> {
        self.session(call_id).map(|s| context_for(&s))
    }

    /// Drops sessions idle past [`SessionPolicy::idle_ttl`] and forgets
    /// ended calls older than [`SessionPolicy::ended_ttl`]. Returns how many
    /// sessions were dropped.
    ///
    /// Also runs whenever a new session opens; call it periodically so
    /// quiet periods release memory too.
    pub fn evict_idle(&self) -> usize {
        let evicted = self.write_calls().sweep(Instant::now(), &self.policy);
        if evicted > 0 {
            tracing::info!(count = evicted, "evicted idle call sessions");
        }
        evicted
    }

    /// Dispatches one invocation within a call.
    ///
    /// A non-empty `call_id` with no session opens one, unless that call
    /// ended recently. Without a session the invocation still runs, with a
    /// context that carries the call id but is not tracked.
    pub async fn invoke(
        &self,
        call_id: Option<&str>,
        name: &str,
        raw_arguments: &Value,
        raw_request: Value,
    ) -> Result<Invocation, DispatchError> {
        let session = call_id
            .filter(|id| !id.is_empty())
            .and_then(|id| self.session_for_invoke(id));
        let Some(session) = session else {
            let ctx = CallContext::new(call_id.unwrap_or_default()).with_raw_request(raw_request);
            return self.dispatcher.invoke(name, raw_arguments, &ctx).await;
        };

        let ctx = context_for(&session).with_raw_request(raw_request);
        let _pending = session.track();
        self.dispatcher.invoke(name, raw_arguments, &ctx).await
    }

    fn session_for_invoke(&self, call_id: &str) -> Option<Arc<CallSession>> {
        if let Some(session) = self.session(call_id) {
            return Some(session);
        }
        let now = Instant::now();
        let mut calls = self.write_calls();
        if calls.recently_ended(call_id, now, &self.policy) {
            tracing::debug!(call_id, "invocation after call ended; not reopening");
            return None;
        }
        Some(calls.open(call_id, now, &self.policy))
    }

    /// Closes the call named in `payload` and persists its summary.
    ///
    /// The storage key is the payload's `call_id`, or a timestamp key when
    /// it has none. Persistence failures are logged and otherwise ignored.
    /// Returns the key used.
    pub async fn end_call(&self, payload: Value) -> String {
        let call_id = payload
            .get("call_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if let Some(id) = &call_id {
            let removed = {
                let now = Instant::now();
                let mut calls = self.write_calls();
                calls.sweep(now, &self.policy);
                calls.ended.insert(id.clone(), now);
                calls.active.remove(id)
            };
            if let Some(session) = removed {
                tracing::info!(
                    call_id = %id,
                    duration_s = (chrono::Utc::now() - session.started_at()).num_seconds(),
                    pending = session.pending_invocations(),
                    "call ended"
                );
            }
        }

        let key = call_id.unwrap_or_else(synthetic_key);
        let record = CallSummaryRecord {
            call_id: key.clone(),
            summary_text: extract_summary(&payload),
            raw_payload: payload,
        };

        match self.persist(record).await {
            Ok(()) => tracing::info!(call_id = %key, "saved call summary"),
            Err(e) => tracing::error!(call_id = %key, error = %e, "failed to save call summary"),
        }
        key
    }

    async fn persist(&self, record: CallSummaryRecord) -> Result<(), PersistenceError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&record))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))?
    }

    fn read_calls(&self) -> RwLockReadGuard<'_, CallTable> {
        self.calls.read().unwrap_or_else(|poisoned| {
            tracing::error!("call session lock poisoned");
            poisoned.into_inner()
        })
    }

    fn write_calls(&self) -> RwLockWriteGuard<'_, CallTable> {
        self.calls.write().unwrap_or_else(|poisoned| {
            tracing::error!("call session lock poisoned");
            poisoned.into_inner()
        })
    }
}

fn context_for(session: &CallSession) -> CallContext {
    CallContext {
        call_id: session.call_id().to_string(),
        started_at: session.started_at(),
        raw_request: Value::Null,
    }
}

/// `post_prompt_data.substituted`, then `post_prompt_data.raw`, then a
/// top-level `summary`. Blank values are skipped.
pub fn extract_summary(payload: &Value) -> String {
    [
        payload.pointer("/post_prompt_data/substituted"),
        payload.pointer("/post_prompt_data/raw"),
        payload.get("summary"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .map(str::trim)
    .find(|s| !s.is_empty())
    .unwrap_or_default()
    .to_string()
}

/// Local time down to the microsecond: `YYYYmmdd_HHMMSS_ffffff`.
pub fn synthetic_key() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%6f").to_string()
}
