//! The `datetime` skill: current time and date in any IANA time zone.
//!
//! Configuration: `{"default_timezone": "America/New_York"}` (optional,
//! defaults to UTC).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use switchboard_types::{FunctionResult, ParamType, ParameterSpec};

use super::config_object;
use crate::capability::{Capability, LocalHandler};
use crate::error::{HandlerError, SkillError};

const SKILL: &str = "datetime";

pub(super) fn capabilities(config: &Value) -> Result<Vec<Capability>, SkillError> {
    let default_tz = match config_object(SKILL, config)?.and_then(|c| c.get("default_timezone")) {
        None | Some(Value::Null) => Tz::UTC,
        Some(Value::String(name)) => name.parse::<Tz>().map_err(|_| SkillError::Config {
            skill: SKILL.to_string(),
            reason: format!("unknown default_timezone '{name}'"),
        })?,
        Some(_) => {
            return Err(SkillError::Config {
                skill: SKILL.to_string(),
                reason: "default_timezone must be a string".to_string(),
            })
        }
    };

    let timezone_param = || {
        vec![ParameterSpec::new(
            "timezone",
            ParamType::String,
            format!("IANA time zone name, e.g. America/Chicago. Defaults to {}.", default_tz.name()),
            false,
        )]
    };

    Ok(vec![
        Capability::skill(
            SKILL,
            config,
            "get_current_time",
            "Get the current time, optionally in a specific time zone.",
            timezone_param(),
            LocalHandler::new(move |args, _| async move {
                let tz = requested_zone(&args, default_tz)?;
                Ok(FunctionResult::new(describe_time(Utc::now(), tz)))
            }),
        ),
        Capability::skill(
            SKILL,
            config,
            "get_current_date",
            "Get today's date, optionally in a specific time zone.",
            timezone_param(),
            LocalHandler::new(move |args, _| async move {
                let tz = requested_zone(&args, default_tz)?;
                Ok(FunctionResult::new(describe_date(Utc::now(), tz)))
            }),
        ),
    ])
}

fn requested_zone(args: &crate::Arguments, default_tz: Tz) -> Result<Tz, HandlerError> {
    match args.get("timezone").and_then(Value::as_str).map(str::trim) {
        None | Some("") => Ok(default_tz),
        Some(name) => name.parse::<Tz>().map_err(|_| {
            HandlerError::spoken(
                format!("unknown time zone '{name}'"),
                format!("I don't recognize the time zone {name}. Could you name a nearby city?"),
            )
        }),
    }
}

fn describe_time(now: DateTime<Utc>, tz: Tz) -> String {
    let local = now.with_timezone(&tz);
    format!(
        "The current time in {} is {}.",
        tz.name(),
        local.format("%-I:%M %p %Z")
    )
}

fn describe_date(now: DateTime<Utc>, tz: Tz) -> String {
    let local = now.with_timezone(&tz);
    format!(
        "Today's date in {} is {}.",
        tz.name(),
        local.format("%A, %B %-d, %Y")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn noon_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 16, 5, 0).unwrap()
    }

    #[test]
    fn describes_time_in_zone() {
        let text = describe_time(noon_utc(), chrono_tz::America::New_York);
        assert_eq!(text, "The current time in America/New_York is 12:05 PM EDT.");
    }

    #[test]
    fn describes_date_across_midnight() {
        let late = Utc.with_ymd_and_hms(2026, 10, 15, 23, 30, 0).unwrap();
        let text = describe_date(late, chrono_tz::Asia::Tokyo);
        assert_eq!(text, "Today's date in Asia/Tokyo is Friday, October 16, 2026.");
    }

    #[test]
    fn default_zone_comes_from_config() {
        let caps = capabilities(&json!({"default_timezone": "America/New_York"})).unwrap();
        let names: Vec<_> = caps.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["get_current_time", "get_current_date"]);
        assert!(caps[0].parameters()[0].description.contains("America/New_York"));
    }

    #[test]
    fn bad_default_zone_is_config_error() {
        assert!(matches!(
            capabilities(&json!({"default_timezone": "Mars/Olympus"})),
            Err(SkillError::Config { .. })
        ));
    }

    #[test]
    fn unknown_requested_zone_is_spoken() {
        let mut args = crate::Arguments::new();
        args.insert("timezone".into(), json!("Nowhere/Special"));
        let err = requested_zone(&args, Tz::UTC).unwrap_err();
        assert!(err.spoken.unwrap().contains("Nowhere/Special"));

        args.insert("timezone".into(), json!("  "));
        assert_eq!(requested_zone(&args, Tz::UTC).unwrap(), Tz::UTC);
    }
}
