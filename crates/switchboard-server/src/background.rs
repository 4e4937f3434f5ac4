//! Background tasks for the switchboard server.

use std::sync::Arc;

use switchboard_calls::CallLifecycleManager;
use tokio::time::{sleep, Duration};

/// Periodically drops call sessions that went quiet without a summary.
///
/// Runs until the runtime shuts down. Checks every `idle_ttl_secs / 2`
/// seconds, at least once a second and at most once a minute.
pub async fn start_session_expiry_task(
    lifecycle: Arc<CallLifecycleManager>,
    idle_ttl_secs: u64,
) {
    if idle_ttl_secs == 0 {
        tracing::warn!("session expiry disabled (idle_ttl=0)");
        return;
    }

    let interval_seconds = (idle_ttl_secs / 2).clamp(1, 60);
    let interval = Duration::from_secs(interval_seconds);

    tracing::info!(idle_ttl_secs, interval_seconds, "starting session expiry task");

    loop {
        sleep(interval).await;
        lifecycle.evict_idle();
    }
}
