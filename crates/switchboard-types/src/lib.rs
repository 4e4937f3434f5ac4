//! Shared types for the Switchboard voice-agent framework.
//!
//! This crate provides the vocabulary every other Switchboard crate speaks:
//! parameter schemas for declared capabilities, the spoken-safe
//! [`FunctionResult`] returned to the AI layer, call-scoped context and
//! summary records, and the resolved [`AddressBinding`].
//!
//! No crate in the workspace depends on anything *except*
//! `switchboard-types` for cross-cutting type definitions. This keeps the
//! dependency graph acyclic.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

mod address;
mod call;
mod result;

pub use address::{AddressBinding, AddressSource};
pub use call::{CallContext, CallSummaryRecord};
pub use result::FunctionResult;

/// Value types a capability parameter may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// A JSON string.
    String,
    /// A JSON integer (no fractional part).
    Int,
    /// Any JSON number.
    Number,
    /// A JSON boolean.
    Bool,
    /// A JSON object.
    Object,
    /// A JSON array.
    Array,
}

impl ParamType {
    /// Returns the short label used in declarations.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Returns the JSON-schema spelling of this type.
    pub fn json_schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "integer",
            Self::Number => "number",
            Self::Bool => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Returns `true` if `value` is an instance of this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParamType {
    type Err = ParseParamTypeError;

    /// Accepts both the short labels and their JSON-schema spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "int" | "integer" => Ok(Self::Int),
            "number" => Ok(Self::Number),
            "bool" | "boolean" => Ok(Self::Bool),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            _ => Err(ParseParamTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown parameter type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseParamTypeError(pub String);

impl std::fmt::Display for ParseParamTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown parameter type: {}", self.0)
    }
}

impl std::error::Error for ParseParamTypeError {}

/// Declaration of one capability parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name, unique within its capability.
    pub name: String,
    /// Declared value type.
    #[serde(rename = "type")]
    pub kind: ParamType,
    /// Text shown to the AI layer.
    pub description: String,
    /// Whether the caller must supply this parameter.
    #[serde(default)]
    pub required: bool,
    /// Allowed values for string parameters, if restricted.
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl ParameterSpec {
    pub fn new(
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required,
            allowed: None,
        }
    }

    /// Restricts the parameter to a fixed set of string values.
    pub fn with_allowed<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Returns `true` if `name` is a valid capability or parameter identifier:
/// an ASCII letter or underscore followed by letters, digits, or underscores.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Renders a parameter list as a JSON-schema object, as exposed to the AI
/// layer in the capability manifest.
pub fn parameters_schema(parameters: &[ParameterSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in parameters {
        let mut property = Map::new();
        property.insert("type".into(), json!(param.kind.json_schema_type()));
        property.insert("description".into(), json!(param.description));
        if let Some(allowed) = &param.allowed {
            property.insert("enum".into(), json!(allowed));
        }
        properties.insert(param.name.clone(), Value::Object(property));
        if param.required {
            required.push(param.name.clone());
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    Value::Object(schema)
}
