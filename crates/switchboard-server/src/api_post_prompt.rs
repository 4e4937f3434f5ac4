//! End-of-call summary webhook.

use std::sync::Arc;

use axum::{body::Bytes, Extension, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Handler for `POST /post_prompt`.
///
/// Always answers 200: a body that isn't JSON is kept as text, and storage
/// failures are only logged.
pub async fn post_prompt_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Bytes,
) -> Json<Value> {
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|e| {
        tracing::warn!(error = %e, bytes = body.len(), "post-prompt body is not JSON");
        json!({ "unparsed_body": String::from_utf8_lossy(&body) })
    });

    let key = state.lifecycle.end_call(payload).await;
    Json(json!({ "status": "ok", "call_id": key }))
}
