//! The declarative builder for remote calls.

use std::collections::{BTreeMap, HashMap};

use switchboard_types::{ParamType, ParameterSpec};

use crate::error::DatamapError;
use crate::spec::{HttpMethod, RemoteCallSpec, RemoteCallTemplate};
use crate::template::Template;

/// Output used when a declaration supplies no fallback of its own.
pub const DEFAULT_FALLBACK: &str = "Sorry, I couldn't complete that request right now.";

/// Declarative description of a remote API call.
///
/// Every setter may be called in any order; problems are collected and
/// reported together by [`DataMap::compile`].
///
/// ```rust,ignore
/// let spec = DataMap::new("get_weather")
///     .description("Get the current weather for a city.")
///     .parameter("city", "string", "The city to get weather for", true)
///     .bind("WEATHER_API_KEY", api_key)
///     .webhook(
///         "GET",
///         "https://api.weatherapi.com/v1/current.json?key=${config.WEATHER_API_KEY}&q=${enc:args.city}",
///     )
///     .output("Weather in ${args.city}: ${response.current.condition.text}")
///     .fallback_output("Sorry, I couldn't get the weather for ${args.city}.")
///     .compile()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataMap {
    name: String,
    description: String,
    parameters: Vec<DeclaredParameter>,
    webhook: Option<(String, String)>,
    headers: Vec<(String, String)>,
    bindings: HashMap<String, String>,
    output: Option<String>,
    fallback: Option<String>,
}

#[derive(Debug, Clone)]
struct DeclaredParameter {
    name: String,
    kind: String,
    description: String,
    required: bool,
    allowed: Option<Vec<String>>,
}

impl DataMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares a parameter. `kind` is one of `string`, `int`, `number`,
    /// `bool`, `object`, `array` (JSON-schema spellings also accepted).
    pub fn parameter(
        mut self,
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        self.parameters.push(DeclaredParameter {
            name: name.into(),
            kind: kind.into(),
            description: description.into(),
            required,
            allowed: None,
        });
        self
    }

    /// Declares a string parameter restricted to `values`.
    pub fn enum_parameter<I, S>(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: I,
        required: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.push(DeclaredParameter {
            name: name.into(),
            kind: "string".to_string(),
            description: description.into(),
            required,
            allowed: Some(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// Sets the HTTP method and URL template. A later call replaces an
    /// earlier one.
    pub fn webhook(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.webhook = Some((method.into(), url.into()));
        self
    }

    /// Adds a static request header. The value may use `${config.*}`.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Binds a build-time value for `${config.NAME}` references.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    pub fn output(mut self, template: impl Into<String>) -> Self {
        self.output = Some(template.into());
        self
    }

    pub fn fallback_output(mut self, template: impl Into<String>) -> Self {
        self.fallback = Some(template.into());
        self
    }

    /// Validates the declaration and produces the immutable spec.
    ///
    /// # Errors
    ///
    /// - [`DatamapError::Schema`] for a missing name, webhook, or output, a
    ///   malformed parameter, or an unsupported method.
    /// - [`DatamapError::Template`] for grammar violations, including
    ///   response references outside the output template.
    /// - [`DatamapError::UndeclaredParameter`] when a template references a
    ///   parameter that was not declared.
    /// - [`DatamapError::UnboundConfig`] when a `${config.*}` value was
    ///   never bound.
    pub fn compile(self) -> Result<RemoteCallSpec, DatamapError> {
        let parameters = self.compile_parameters()?;

        let (method, url) = self
            .webhook
            .as_ref()
            .ok_or_else(|| DatamapError::Schema(format!("'{}' has no webhook", self.name)))?;
        let method: HttpMethod = method.parse().map_err(DatamapError::Schema)?;

        let output = self
            .output
            .as_deref()
            .ok_or_else(|| DatamapError::Schema(format!("'{}' has no output", self.name)))?;
        let fallback = self.fallback.as_deref().unwrap_or(DEFAULT_FALLBACK);

        let url_template = parse_field("url", url)?.bind_config("url", &self.bindings, true)?;

        let mut headers = BTreeMap::new();
        for (name, value) in &self.headers {
            let template =
                parse_field("header", value)?.bind_config("header", &self.bindings, false)?;
            headers.insert(name.clone(), template);
        }

        let template = RemoteCallTemplate::new(
            method,
            url_template,
            headers,
            parse_call_time("output", output)?,
            parse_call_time("fallback", fallback)?,
        );
        let spec = RemoteCallSpec::new(self.name, self.description, parameters, template)?;

        tracing::debug!(
            function = %spec.name(),
            method = method.as_str(),
            parameters = spec.parameters().len(),
            "compiled remote call"
        );
        Ok(spec)
    }

    /// Parameter names and uniqueness are checked by [`RemoteCallSpec::new`].
    fn compile_parameters(&self) -> Result<Vec<ParameterSpec>, DatamapError> {
        self.parameters
            .iter()
            .map(|param| {
                let kind: ParamType = param.kind.parse().map_err(|e| {
                    DatamapError::Schema(format!("parameter '{}': {e}", param.name))
                })?;
                Ok(ParameterSpec {
                    name: param.name.clone(),
                    kind,
                    description: param.description.clone(),
                    required: param.required,
                    allowed: param.allowed.clone(),
                })
            })
            .collect()
    }
}

fn parse_field(field: &'static str, source: &str) -> Result<Template, DatamapError> {
    Template::parse_declared(source).map_err(|e| DatamapError::Template {
        field,
        reason: e.0,
    })
}

/// Output and fallback templates are rendered by the remote platform,
/// where build-time values do not exist.
fn parse_call_time(field: &'static str, source: &str) -> Result<Template, DatamapError> {
    Template::parse(source).map_err(|e| DatamapError::Template {
        field,
        reason: e.0,
    })
}
