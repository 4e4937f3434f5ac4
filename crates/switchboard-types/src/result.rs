//! The spoken-safe result handed back to the AI layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a capability invocation.
///
/// `response` is text the AI layer may speak or paraphrase to the caller.
/// `actions` are opaque platform directives, serialised under the `action`
/// key the voice platform expects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionResult {
    pub response: String,
    #[serde(default, rename = "action", skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Value>,
}

impl FunctionResult {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            actions: Vec::new(),
        }
    }

    /// Appends a platform action.
    pub fn with_action(mut self, action: Value) -> Self {
        self.actions.push(action);
        self
    }
}
