//! Compiled remote-call specifications and their reference evaluator.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use switchboard_types::{is_valid_identifier, parameters_schema, FunctionResult, ParameterSpec};

use crate::error::{DatamapError, RemoteExecutionError};
use crate::template::{Template, Unresolved};

/// HTTP methods a remote call may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(format!("unsupported HTTP method: {s}")),
        }
    }
}

/// The executable part of a compiled remote call.
///
/// Contains call-time tokens only; build-time bindings were substituted by
/// `compile()`. Fields are private so a compiled template cannot be
/// altered after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCallTemplate {
    method: HttpMethod,
    url_template: Template,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, Template>,
    output_template: Template,
    fallback_template: Template,
}

impl RemoteCallTemplate {
    pub(crate) fn new(
        method: HttpMethod,
        url_template: Template,
        headers: BTreeMap<String, Template>,
        output_template: Template,
        fallback_template: Template,
    ) -> Self {
        Self {
            method,
            url_template,
            headers,
            output_template,
            fallback_template,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url_template(&self) -> &Template {
        &self.url_template
    }

    pub fn headers(&self) -> &BTreeMap<String, Template> {
        &self.headers
    }

    pub fn output_template(&self) -> &Template {
        &self.output_template
    }

    pub fn fallback_template(&self) -> &Template {
        &self.fallback_template
    }

    /// Builds the request URL for one invocation, as the executing platform
    /// would.
    pub fn render_url(&self, args: &Map<String, Value>) -> String {
        // URL templates carry no response tokens (checked at compile time),
        // so rendering cannot be unresolved.
        self.url_template
            .render(args, None)
            .unwrap_or_else(|Unresolved(path)| {
                tracing::warn!(path = %path, "url template referenced response data");
                String::new()
            })
    }

    /// Produces the spoken-safe output for one invocation given what the
    /// remote call returned.
    pub fn resolve(&self, args: &Map<String, Value>, outcome: &RemoteOutcome) -> Resolution {
        let cause = match outcome {
            RemoteOutcome::Json(body) => match self.output_template.render(args, Some(body)) {
                Ok(text) => return Resolution::Output(FunctionResult::new(text)),
                Err(Unresolved(path)) => FallbackCause::MissingPath(path),
            },
            RemoteOutcome::Text(_) => FallbackCause::NonJson,
            RemoteOutcome::Failed(err) => FallbackCause::Remote(err.clone()),
        };

        // The fallback references arguments only, so it always renders.
        let text = self
            .fallback_template
            .render(args, None)
            .unwrap_or_default();
        Resolution::Fallback {
            result: FunctionResult::new(text),
            cause,
        }
    }
}

/// What the remote endpoint produced for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome {
    /// A success response with a JSON body.
    Json(Value),
    /// A success response whose body is not JSON.
    Text(String),
    /// The call failed before producing a usable response.
    Failed(RemoteExecutionError),
}

impl RemoteOutcome {
    /// Classifies a raw success body.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(body.to_string()),
        }
    }
}

/// Why the fallback output was used.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackCause {
    MissingPath(String),
    NonJson,
    Remote(RemoteExecutionError),
}

/// Rendered result of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Output(FunctionResult),
    Fallback {
        result: FunctionResult,
        cause: FallbackCause,
    },
}

impl Resolution {
    pub fn result(&self) -> &FunctionResult {
        match self {
            Self::Output(result) | Self::Fallback { result, .. } => result,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// A compiled remote capability: the handoff given to the external
/// execution platform.
///
/// Every template reference resolves against `parameters`. The only ways to
/// obtain a spec, [`DataMap::compile`](crate::DataMap::compile) and
/// deserialization, both go through the same checks, and the fields are
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedRemoteCallSpec")]
pub struct RemoteCallSpec {
    name: String,
    description: String,
    parameters: Vec<ParameterSpec>,
    #[serde(flatten)]
    template: RemoteCallTemplate,
}

/// Wire form of [`RemoteCallSpec`] before its references are checked.
#[derive(Deserialize)]
struct UncheckedRemoteCallSpec {
    name: String,
    description: String,
    parameters: Vec<ParameterSpec>,
    #[serde(flatten)]
    template: RemoteCallTemplate,
}

impl TryFrom<UncheckedRemoteCallSpec> for RemoteCallSpec {
    type Error = DatamapError;

    fn try_from(raw: UncheckedRemoteCallSpec) -> Result<Self, Self::Error> {
        Self::new(raw.name, raw.description, raw.parameters, raw.template)
    }
}

impl RemoteCallSpec {
    pub(crate) fn new(
        name: String,
        description: String,
        parameters: Vec<ParameterSpec>,
        template: RemoteCallTemplate,
    ) -> Result<Self, DatamapError> {
        let spec = Self {
            name,
            description,
            parameters,
            template,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn template(&self) -> &RemoteCallTemplate {
        &self.template
    }

    fn validate(&self) -> Result<(), DatamapError> {
        if !is_valid_identifier(&self.name) {
            return Err(DatamapError::Schema(format!(
                "invalid function name '{}'",
                self.name
            )));
        }

        let mut declared = HashSet::new();
        for param in &self.parameters {
            if !is_valid_identifier(&param.name) {
                return Err(DatamapError::Schema(format!(
                    "invalid parameter name '{}'",
                    param.name
                )));
            }
            if !declared.insert(param.name.as_str()) {
                return Err(DatamapError::Schema(format!(
                    "parameter '{}' declared twice",
                    param.name
                )));
            }
        }

        let t = &self.template;
        reject_response_refs("url", &t.url_template)?;
        check_arguments("url", &t.url_template, &declared)?;
        for header in t.headers.values() {
            reject_response_refs("header", header)?;
            check_arguments("header", header, &declared)?;
        }
        check_arguments("output", &t.output_template, &declared)?;
        reject_response_refs("fallback", &t.fallback_template)?;
        check_arguments("fallback", &t.fallback_template, &declared)
    }

    /// Renders the function document in the shape the voice platform
    /// consumes for serverless functions.
    pub fn to_function_document(&self) -> Value {
        let template = &self.template;
        let mut webhook = json!({
            "url": template.url_template.to_string(),
            "method": template.method.as_str(),
            "output": { "response": template.output_template.to_string() },
        });
        if !template.headers.is_empty() {
            let headers: Map<String, Value> = template
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), json!(value.to_string())))
                .collect();
            webhook["headers"] = Value::Object(headers);
        }

        json!({
            "function": self.name,
            "description": self.description,
            "parameters": parameters_schema(&self.parameters),
            "data_map": {
                "webhooks": [webhook],
                "output": { "response": template.fallback_template.to_string() },
            },
        })
    }
}

fn reject_response_refs(field: &'static str, template: &Template) -> Result<(), DatamapError> {
    if template.has_response_references() {
        return Err(DatamapError::Template {
            field,
            reason: "response data is not available here".to_string(),
        });
    }
    Ok(())
}

fn check_arguments(
    field: &'static str,
    template: &Template,
    declared: &HashSet<&str>,
) -> Result<(), DatamapError> {
    match template.arg_references().find(|name| !declared.contains(name)) {
        Some(name) => Err(DatamapError::UndeclaredParameter {
            field,
            parameter: name.to_string(),
        }),
        None => Ok(()),
    }
}
