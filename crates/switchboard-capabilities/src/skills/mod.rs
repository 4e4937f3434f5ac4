//! Built-in skills: pre-packaged capabilities configured by name.
//!
//! A skill is a factory. Given its configuration it produces one or more
//! [`Capability`] values in `BuiltinSkill` mode, each backed by a local
//! handler and dispatched under the same fail-soft rules as any other
//! local handler.

mod datetime;
mod math;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capability::Capability;
use crate::error::SkillError;

pub use math::{evaluate, MathError};

/// Builds a skill's capabilities from its configuration.
pub type SkillFactory = fn(&Value) -> Result<Vec<Capability>, SkillError>;

/// Skill factories keyed by skill name.
#[derive(Clone, Default)]
pub struct SkillCatalog {
    factories: BTreeMap<String, SkillFactory>,
}

impl std::fmt::Debug for SkillCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

impl SkillCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding the `datetime` and `math` skills.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.insert("datetime", datetime::capabilities);
        catalog.insert("math", math::capabilities);
        catalog
    }

    /// Adds or replaces a skill factory.
    pub fn insert(&mut self, name: impl Into<String>, factory: SkillFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Runs the named factory.
    pub fn instantiate(&self, name: &str, config: &Value) -> Result<Vec<Capability>, SkillError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SkillError::Unknown(name.to_string()))?;
        factory(config)
    }
}

/// Accepts `null` or an object; anything else is a configuration error.
fn config_object<'a>(
    skill: &str,
    config: &'a Value,
) -> Result<Option<&'a serde_json::Map<String, Value>>, SkillError> {
    match config {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        _ => Err(SkillError::Config {
            skill: skill.to_string(),
            reason: "configuration must be an object".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_skill() {
        let catalog = SkillCatalog::with_builtins();
        assert_eq!(
            catalog.instantiate("weather", &Value::Null).unwrap_err(),
            SkillError::Unknown("weather".into())
        );
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["datetime", "math"]);
    }

    #[test]
    fn rejects_non_object_config() {
        let catalog = SkillCatalog::with_builtins();
        assert!(matches!(
            catalog.instantiate("math", &Value::from("yes")),
            Err(SkillError::Config { .. })
        ));
    }
}
