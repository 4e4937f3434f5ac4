//! Switchboard server library logic.

pub mod agent;
pub mod api;
pub mod api_post_prompt;
pub mod api_swaig;
pub mod background;
pub mod config;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use switchboard_calls::{CallLifecycleManager, SessionPolicy, SummaryStore};
use switchboard_capabilities::{
    CapabilityRegistry, DispatchPolicy, FunctionDispatcher, RegistryError,
};
use switchboard_prompt::PromptComposer;
use switchboard_types::AddressBinding;
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read-only after startup.
    pub registry: Arc<CapabilityRegistry>,
    pub lifecycle: Arc<CallLifecycleManager>,
    pub composer: Arc<PromptComposer>,
    /// Resolved once at startup.
    pub binding: Arc<AddressBinding>,
    pub agent_name: String,
}

/// Builds the registry, dispatcher, and lifecycle manager from
/// configuration.
pub fn build_state(
    config: &Config,
    binding: AddressBinding,
    store: Arc<dyn SummaryStore>,
) -> Result<AppState, RegistryError> {
    let registry = Arc::new(agent::build_registry(&config.agent, &config.secrets)?);
    let policy = DispatchPolicy {
        timeout: Duration::from_millis(config.agent.handler_timeout_ms),
        ..DispatchPolicy::default()
    };
    let dispatcher = FunctionDispatcher::with_policy(Arc::clone(&registry), policy);
    let sessions = SessionPolicy {
        idle_ttl: Duration::from_secs(config.calls.session_idle_ttl_secs),
        ended_ttl: Duration::from_secs(config.calls.ended_call_ttl_secs),
    };

    Ok(AppState {
        registry,
        lifecycle: Arc::new(CallLifecycleManager::with_policy(dispatcher, store, sessions)),
        composer: Arc::new(agent::buddy_prompt(&config.agent.name)),
        binding: Arc::new(binding),
        agent_name: config.agent.name.clone(),
    })
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agent", get(api::agent_handler))
        .route("/swaig", post(api_swaig::swaig_handler))
        .route("/post_prompt", post(api_post_prompt::post_prompt_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
