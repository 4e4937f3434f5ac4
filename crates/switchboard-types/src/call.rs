//! Call-scoped context and the persisted end-of-call summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context supplied to local handlers for the call they run in.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    pub call_id: String,
    pub started_at: DateTime<Utc>,
    /// The raw request body that triggered the invocation, if any.
    pub raw_request: Value,
}

impl CallContext {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            started_at: Utc::now(),
            raw_request: Value::Null,
        }
    }

    pub fn with_raw_request(mut self, raw: Value) -> Self {
        self.raw_request = raw;
        self
    }
}

/// One persisted call summary, keyed by `call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummaryRecord {
    pub call_id: String,
    #[serde(rename = "summary")]
    pub summary_text: String,
    pub raw_payload: Value,
}
