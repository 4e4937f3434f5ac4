//! Substitution templates, parsed once into an instruction list.
//!
//! The grammar has three call-time token forms and one build-time form:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `${args.X}` | value of declared parameter `X` |
//! | `${enc:args.X}` | value of `X`, percent-encoded |
//! | `${response.a.b}` | dotted-path lookup into the JSON response |
//! | `${config.NAME}` | build-time binding, replaced by `compile()` |
//!
//! A `$` not followed by `{` is literal text. There is no escaping, no
//! nesting, and no expression evaluation beyond the dotted path.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use switchboard_types::is_valid_identifier;

use crate::error::{DatamapError, TemplateSyntaxError};

/// One instruction of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Arg(String),
    EncodedArg(String),
    /// Path segments below `response`; numeric segments index arrays.
    Response(Vec<String>),
    Config(String),
}

/// A parsed template. Rendering walks the segment list left to right;
/// the source string is never rescanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// A `${response...}` path that had no usable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved(pub String);

impl Template {
    /// Parses a compiled template. `${config.*}` tokens are rejected: a
    /// compiled template contains call-time tokens only.
    pub fn parse(source: &str) -> Result<Self, TemplateSyntaxError> {
        Self::parse_with(source, false)
    }

    /// Parses a declared template, which may still carry build-time tokens.
    pub(crate) fn parse_declared(source: &str) -> Result<Self, TemplateSyntaxError> {
        Self::parse_with(source, true)
    }

    fn parse_with(source: &str, allow_config: bool) -> Result<Self, TemplateSyntaxError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(start) = rest.find("${") {
            literal.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                TemplateSyntaxError(format!(
                    "unterminated token at byte {}",
                    source.len() - rest.len() + start
                ))
            })?;

            let token = parse_token(&after[..end], allow_config)?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(token);
            rest = &after[end + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of every parameter referenced, encoded or not.
    pub fn arg_references(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Arg(name) | Segment::EncodedArg(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn config_references(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Config(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_response_references(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Response(_)))
    }

    /// Replaces every `${config.NAME}` with its bound value.
    ///
    /// With `encode` set, values are percent-encoded, which also guarantees
    /// the baked-in text cannot form a `${...}` token. Without it, a value
    /// that contains `${` is refused.
    pub(crate) fn bind_config(
        &self,
        field: &'static str,
        bindings: &HashMap<String, String>,
        encode: bool,
    ) -> Result<Self, DatamapError> {
        let mut segments: Vec<Segment> = Vec::with_capacity(self.segments.len());

        for segment in &self.segments {
            let next = match segment {
                Segment::Config(name) => {
                    let value = bindings
                        .get(name)
                        .ok_or_else(|| DatamapError::UnboundConfig(name.clone()))?;
                    if encode {
                        Segment::Literal(urlencoding::encode(value).into_owned())
                    } else if value.contains("${") {
                        return Err(DatamapError::Template {
                            field,
                            reason: format!("build-time value '{name}' contains template syntax"),
                        });
                    } else {
                        Segment::Literal(value.clone())
                    }
                }
                other => other.clone(),
            };

            // Adjacent literals are merged so the canonical text re-parses
            // to the same segment list.
            match (segments.last_mut(), next) {
                (Some(Segment::Literal(prev)), Segment::Literal(text)) => prev.push_str(&text),
                (_, next) => segments.push(next),
            }
        }

        Ok(Self { segments })
    }

    /// Renders the template against call-time arguments and, when
    /// available, the parsed remote response.
    ///
    /// Missing or `null` arguments render as empty text. A response path
    /// with no value, a `null` value, or no response at all yields
    /// [`Unresolved`].
    pub fn render(
        &self,
        args: &Map<String, Value>,
        response: Option<&Value>,
    ) -> Result<String, Unresolved> {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Arg(name) => out.push_str(&arg_text(args, name)),
                Segment::EncodedArg(name) => {
                    out.push_str(&urlencoding::encode(&arg_text(args, name)))
                }
                Segment::Response(path) => {
                    let text = response
                        .and_then(|body| lookup(body, path))
                        .and_then(value_text)
                        .ok_or_else(|| Unresolved(format!("response.{}", path.join("."))))?;
                    out.push_str(&text);
                }
                Segment::Config(name) => out.push_str(&format!("${{config.{name}}}")),
            }
        }

        Ok(out)
    }
}

fn parse_token(body: &str, allow_config: bool) -> Result<Segment, TemplateSyntaxError> {
    let (encode, expr) = match body.split_once(':') {
        Some(("enc", expr)) => (true, expr),
        Some((filter, _)) => {
            return Err(TemplateSyntaxError(format!(
                "unknown filter '{filter}' in '${{{body}}}'"
            )))
        }
        None => (false, body),
    };

    let mut parts = expr.split('.');
    let root = parts.next().unwrap_or_default();
    let path: Vec<&str> = parts.collect();
    if path.is_empty() || path.iter().any(|p| p.is_empty()) {
        return Err(TemplateSyntaxError(format!("empty path in '${{{body}}}'")));
    }

    match root {
        "args" => {
            let name = single_name(&path, body)?;
            Ok(if encode {
                Segment::EncodedArg(name)
            } else {
                Segment::Arg(name)
            })
        }
        "response" if !encode => Ok(Segment::Response(
            path.into_iter().map(str::to_string).collect(),
        )),
        "config" if allow_config && !encode => Ok(Segment::Config(single_name(&path, body)?)),
        _ if encode => Err(TemplateSyntaxError(format!(
            "'enc:' applies only to args references, got '${{{body}}}'"
        ))),
        other => Err(TemplateSyntaxError(format!(
            "unknown reference root '{other}' in '${{{body}}}'"
        ))),
    }
}

fn single_name(path: &[&str], body: &str) -> Result<String, TemplateSyntaxError> {
    match path {
        [name] if is_valid_identifier(name) => Ok((*name).to_string()),
        _ => Err(TemplateSyntaxError(format!(
            "expected a single identifier in '${{{body}}}'"
        ))),
    }
}

fn arg_text(args: &Map<String, Value>, name: &str) -> String {
    args.get(name).and_then(value_text).unwrap_or_default()
}

fn lookup<'a>(body: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(body, |current, key| match current {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Strings render unquoted, `null` has no text, everything else renders
/// as compact JSON.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Arg(name) => write!(f, "${{args.{name}}}")?,
                Segment::EncodedArg(name) => write!(f, "${{enc:args.{name}}}")?,
                Segment::Response(path) => write!(f, "${{response.{}}}", path.join("."))?,
                Segment::Config(name) => write!(f, "${{config.{name}}}")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Template {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Template::parse(&source).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn parses_all_token_forms() {
        let template =
            Template::parse("q=${enc:args.city}&n=${args.city} ${response.a.b.c}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("q=".into()),
                Segment::EncodedArg("city".into()),
                Segment::Literal("&n=".into()),
                Segment::Arg("city".into()),
                Segment::Literal(" ".into()),
                Segment::Response(vec!["a".into(), "b".into(), "c".into()]),
            ]
        );
    }

    #[test]
    fn lone_dollar_is_literal() {
        let template = Template::parse("costs $5 or ${args.price}$").unwrap();
        let rendered = template.render(&args(json!({"price": 7})), None).unwrap();
        assert_eq!(rendered, "costs $5 or 7$");
    }

    #[test]
    fn rejects_malformed_tokens() {
        for source in [
            "${args.city",
            "${}",
            "${args.}",
            "${args}",
            "${args.a.b}",
            "${enc:response.x}",
            "${upper:args.city}",
            "${env.HOME}",
            "${args.2city}",
        ] {
            assert!(Template::parse(source).is_err(), "accepted {source:?}");
        }
    }

    #[test]
    fn config_tokens_only_in_declared_templates() {
        assert!(Template::parse("${config.KEY}").is_err());
        let declared = Template::parse_declared("k=${config.KEY}").unwrap();
        assert_eq!(declared.config_references().collect::<Vec<_>>(), ["KEY"]);
    }

    #[test]
    fn renders_weather_example() {
        let template =
            Template::parse("Weather: ${response.current.condition.text}, ${response.current.temp_f}F")
                .unwrap();
        let response = json!({"current": {"temp_f": 72.5, "condition": {"text": "Sunny"}}});
        let rendered = template.render(&Map::new(), Some(&response)).unwrap();
        assert_eq!(rendered, "Weather: Sunny, 72.5F");
    }

    #[test]
    fn encodes_argument_values() {
        let template = Template::parse("q=${enc:args.city}").unwrap();
        let rendered = template
            .render(&args(json!({"city": "New York"})), None)
            .unwrap();
        assert_eq!(rendered, "q=New%20York");
    }

    #[test]
    fn missing_response_path_is_unresolved() {
        let template = Template::parse("${response.current.humidity}").unwrap();
        let response = json!({"current": {"temp_f": 72.5}});
        assert_eq!(
            template.render(&Map::new(), Some(&response)),
            Err(Unresolved("response.current.humidity".into()))
        );
        assert!(template.render(&Map::new(), None).is_err());
    }

    #[test]
    fn null_response_value_is_unresolved() {
        let template = Template::parse("${response.alert}").unwrap();
        assert!(template
            .render(&Map::new(), Some(&json!({"alert": null})))
            .is_err());
    }

    #[test]
    fn numeric_path_segments_index_arrays() {
        let template = Template::parse("${response.items.1.name}").unwrap();
        let response = json!({"items": [{"name": "a"}, {"name": "b"}]});
        assert_eq!(template.render(&Map::new(), Some(&response)).unwrap(), "b");
    }

    #[test]
    fn missing_argument_renders_empty() {
        let template = Template::parse("[${args.city}]").unwrap();
        assert_eq!(template.render(&Map::new(), None).unwrap(), "[]");
    }

    #[test]
    fn binding_encodes_and_merges_literals() {
        let declared = Template::parse_declared("https://x/?key=${config.KEY}&q=${enc:args.q}")
            .unwrap();
        let bindings = HashMap::from([("KEY".to_string(), "a b${args.q}".to_string())]);
        let bound = declared.bind_config("url", &bindings, true).unwrap();

        assert_eq!(
            bound.to_string(),
            "https://x/?key=a%20b%24%7Bargs.q%7D&q=${enc:args.q}"
        );
        assert_eq!(Template::parse(&bound.to_string()).unwrap(), bound);
        assert_eq!(bound.arg_references().collect::<Vec<_>>(), ["q"]);
    }

    #[test]
    fn unencoded_binding_refuses_template_syntax() {
        let declared = Template::parse_declared("Bearer ${config.TOKEN}").unwrap();
        let bindings = HashMap::from([("TOKEN".to_string(), "${args.x}".to_string())]);
        assert!(matches!(
            declared.bind_config("header", &bindings, false),
            Err(DatamapError::Template { field: "header", .. })
        ));
    }

    #[test]
    fn unbound_config_is_reported() {
        let declared = Template::parse_declared("${config.MISSING}").unwrap();
        assert_eq!(
            declared.bind_config("url", &HashMap::new(), true),
            Err(DatamapError::UnboundConfig("MISSING".into()))
        );
    }
}
