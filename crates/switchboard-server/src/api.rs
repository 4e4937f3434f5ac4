//! Shared API types and the agent document endpoint.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use switchboard_prompt::AgentDocument;
use switchboard_types::AddressSource;
use thiserror::Error;

use crate::AppState;

/// Spoken when the platform asks for a function this agent doesn't have.
pub const UNKNOWN_FUNCTION_RESPONSE: &str = "Sorry, I can't help with that one yet.";

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),

    /// Carries a `response` the agent can still speak.
    #[error("unknown function: {0}")]
    UnknownFunction(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::UnknownFunction(name) => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": format!("unknown function: {name}"),
                    "response": UNKNOWN_FUNCTION_RESPONSE,
                }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// Response for `GET /agent`.
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub name: String,
    pub web_hook_url: String,
    pub post_prompt_url: String,
    pub address_source: AddressSource,
    #[serde(flatten)]
    pub document: AgentDocument,
}

/// Handler for `GET /agent`: the prompt, capability manifest, remote
/// handoff documents, and absolute callback URLs.
pub async fn agent_handler(Extension(state): Extension<Arc<AppState>>) -> Json<AgentResponse> {
    Json(AgentResponse {
        name: state.agent_name.clone(),
        web_hook_url: state.binding.url_for("/swaig"),
        post_prompt_url: state.binding.url_for("/post_prompt"),
        address_source: state.binding.source(),
        document: state.composer.compose(&state.registry),
    })
}
