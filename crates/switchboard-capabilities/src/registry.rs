//! The set of declared capabilities.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use switchboard_datamap::RemoteCallSpec;
use switchboard_types::{is_valid_identifier, parameters_schema};

use crate::capability::{Capability, CapabilityMode};
use crate::error::RegistryError;
use crate::skills::SkillCatalog;

/// One entry of the manifest exposed to the AI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Declared capabilities in registration order.
///
/// Populated once at startup and then shared read-only (behind an `Arc`)
/// by the dispatcher and prompt composer. Registration takes `&mut self`,
/// so nothing can be added once the registry is shared.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: Vec<Capability>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::DuplicateName`] if the name is taken. The existing
    ///   registration is left untouched.
    /// - [`RegistryError::Schema`] if the capability or one of its
    ///   parameters has a malformed name, or a parameter name repeats.
    pub fn register(&mut self, capability: Capability) -> Result<(), RegistryError> {
        validate_schema(&capability)?;
        if self.index.contains_key(capability.name()) {
            return Err(RegistryError::DuplicateName(capability.name().to_string()));
        }

        tracing::debug!(
            capability = capability.name(),
            mode = capability.mode().label(),
            "registered capability"
        );
        self.index
            .insert(capability.name().to_string(), self.capabilities.len());
        self.capabilities.push(capability);
        Ok(())
    }

    /// Instantiates a built-in skill and registers every capability it
    /// provides. Nothing is registered if any of them would fail.
    pub fn add_skill(
        &mut self,
        catalog: &SkillCatalog,
        skill: &str,
        config: Value,
    ) -> Result<usize, RegistryError> {
        let capabilities = catalog.instantiate(skill, &config)?;

        let mut names = HashSet::new();
        for capability in &capabilities {
            validate_schema(capability)?;
            if self.index.contains_key(capability.name()) || !names.insert(capability.name()) {
                return Err(RegistryError::DuplicateName(capability.name().to_string()));
            }
        }

        let count = capabilities.len();
        for capability in capabilities {
            self.register(capability)?;
        }
        tracing::info!(skill, capabilities = count, "added skill");
        Ok(count)
    }

    /// All capabilities, in registration order.
    pub fn list(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Looks up one capability by name.
    pub fn describe(&self, name: &str) -> Result<&Capability, RegistryError> {
        self.index
            .get(name)
            .map(|&i| &self.capabilities[i])
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// The capability manifest, independent of execution mode.
    pub fn manifest(&self) -> Vec<ManifestEntry> {
        self.capabilities
            .iter()
            .map(|c| ManifestEntry {
                name: c.name().to_string(),
                description: c.description().to_string(),
                parameters: parameters_schema(c.parameters()),
            })
            .collect()
    }

    /// Compiled specs of every remote capability, in registration order.
    pub fn remote_specs(&self) -> Vec<Arc<RemoteCallSpec>> {
        self.capabilities
            .iter()
            .filter_map(|c| match c.mode() {
                CapabilityMode::RemoteTemplate(spec) => Some(Arc::clone(spec)),
                _ => None,
            })
            .collect()
    }
}

fn validate_schema(capability: &Capability) -> Result<(), RegistryError> {
    if !is_valid_identifier(capability.name()) {
        return Err(RegistryError::Schema(format!(
            "invalid capability name '{}'",
            capability.name()
        )));
    }

    let mut seen = HashSet::new();
    for param in capability.parameters() {
        if !is_valid_identifier(&param.name) {
            return Err(RegistryError::Schema(format!(
                "capability '{}' has invalid parameter name '{}'",
                capability.name(),
                param.name
            )));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(RegistryError::Schema(format!(
                "capability '{}' declares parameter '{}' twice",
                capability.name(),
                param.name
            )));
        }
    }
    Ok(())
}
