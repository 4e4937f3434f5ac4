//! Argument validation against declared parameters.

use serde_json::{Map, Value};
use switchboard_types::ParameterSpec;

use crate::error::{FieldError, ValidationError};

/// Checks `raw` against `parameters` and returns the argument object.
///
/// `null` is treated as an empty object. Undeclared keys are kept but not
/// checked. Every problem is collected before returning, so the error names
/// all offending fields at once.
pub fn validate_arguments(
    parameters: &[ParameterSpec],
    raw: &Value,
) -> Result<Map<String, Value>, ValidationError> {
    let args = match raw {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        other => {
            return Err(ValidationError {
                errors: vec![FieldError {
                    field: "arguments".to_string(),
                    reason: format!("must be an object, got {}", json_kind(other)),
                }],
            })
        }
    };

    let mut errors = Vec::new();
    for param in parameters {
        match args.get(&param.name) {
            None | Some(Value::Null) if param.required => errors.push(FieldError {
                field: param.name.clone(),
                reason: "is required".to_string(),
            }),
            None | Some(Value::Null) => {}
            Some(value) if !param.kind.accepts(value) => errors.push(FieldError {
                field: param.name.clone(),
                reason: format!("must be {}, got {}", param.kind, json_kind(value)),
            }),
            Some(Value::String(s)) => {
                if let Some(allowed) = &param.allowed {
                    if !allowed.iter().any(|a| a == s) {
                        errors.push(FieldError {
                            field: param.name.clone(),
                            reason: format!("must be one of {}", allowed.join(", ")),
                        });
                    }
                }
            }
            Some(_) => {}
        }
    }

    for key in args.keys() {
        if !parameters.iter().any(|p| &p.name == key) {
            tracing::debug!(argument = %key, "ignoring undeclared argument");
        }
    }

    if errors.is_empty() {
        Ok(args)
    } else {
        Err(ValidationError { errors })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_types::ParamType;

    fn params() -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("city", ParamType::String, "City", true),
            ParameterSpec::new("days", ParamType::Int, "Days", false),
            ParameterSpec::new("units", ParamType::String, "Units", false)
                .with_allowed(["metric", "imperial"]),
        ]
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = validate_arguments(&params(), &json!({"city": "Oslo", "days": 3})).unwrap();
        assert_eq!(args["city"], "Oslo");
    }

    #[test]
    fn null_means_no_arguments() {
        assert!(validate_arguments(&[], &Value::Null).unwrap().is_empty());
        let err = validate_arguments(&params(), &Value::Null).unwrap_err();
        assert_eq!(err.fields(), ["city"]);
    }

    #[test]
    fn names_every_offending_field() {
        let err = validate_arguments(&params(), &json!({"days": 2.5, "units": "kelvin"}))
            .unwrap_err();
        assert_eq!(err.fields(), ["city", "days", "units"]);
        assert_eq!(
            err.to_string(),
            "invalid arguments: city is required; days must be int, got number; \
             units must be one of metric, imperial"
        );
    }

    #[test]
    fn explicit_null_counts_as_missing() {
        let err = validate_arguments(&params(), &json!({"city": null})).unwrap_err();
        assert_eq!(err.fields(), ["city"]);
    }

    #[test]
    fn rejects_non_object_arguments() {
        let err = validate_arguments(&params(), &json!(["Oslo"])).unwrap_err();
        assert_eq!(err.fields(), ["arguments"]);
    }

    #[test]
    fn keeps_undeclared_arguments() {
        let args = validate_arguments(&params(), &json!({"city": "Oslo", "mood": "sunny"})).unwrap();
        assert_eq!(args["mood"], "sunny");
    }
}
