//! Function invocation webhook.

use std::sync::Arc;

use axum::{
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::Value;
use switchboard_capabilities::{DispatchError, Invocation};

use crate::api::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SwaigRequest {
    pub function: String,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub argument: Option<SwaigArgument>,
}

/// Arguments as the platform sends them: already parsed into a list (only
/// the first entry is used), or as a raw JSON string.
#[derive(Debug, Default, Deserialize)]
pub struct SwaigArgument {
    #[serde(default)]
    pub parsed: Vec<Value>,
    #[serde(default)]
    pub raw: Option<String>,
}

impl SwaigArgument {
    fn into_value(self) -> Value {
        if let Some(first) = self.parsed.into_iter().next() {
            return first;
        }
        self.raw
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(Value::Null)
    }
}

/// Handler for `POST /swaig`.
///
/// Local capabilities answer with `{response, action}`. Remote capabilities
/// answer with their handoff document. Argument and handler failures still
/// answer 200 with a spoken fallback; only an unknown function is a 404.
pub async fn swaig_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let request: SwaigRequest = serde_json::from_value(body.clone())
        .map_err(|e| ApiError::BadRequest(format!("malformed function request: {e}")))?;
    let arguments = request.argument.unwrap_or_default().into_value();

    let invocation = state
        .lifecycle
        .invoke(request.call_id.as_deref(), &request.function, &arguments, body)
        .await
        .map_err(|e| match e {
            DispatchError::NotFound(name) => ApiError::UnknownFunction(name),
        })?;

    Ok(match invocation {
        Invocation::Completed(result) | Invocation::Fallback { result, .. } => {
            Json(result).into_response()
        }
        Invocation::Remote(spec) => Json(spec.to_function_document()).into_response(),
    })
}
