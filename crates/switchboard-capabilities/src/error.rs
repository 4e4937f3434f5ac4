//! Error types for capability registration and dispatch.

use std::fmt;

/// Errors raised while populating or querying a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A capability with this name is already registered.
    #[error("capability already registered: {0}")]
    DuplicateName(String),

    /// The capability's declaration is malformed.
    #[error("invalid capability schema: {0}")]
    Schema(String),

    /// No capability with this name exists.
    #[error("capability not found: {0}")]
    NotFound(String),

    /// A built-in skill could not be instantiated.
    #[error(transparent)]
    Skill(#[from] SkillError),
}

/// Errors raised by [`FunctionDispatcher::invoke`](crate::FunctionDispatcher::invoke).
///
/// Everything else an invocation can go through (bad arguments, handler
/// failure, timeout) is reported as a fallback result rather than an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("capability not found: {0}")]
    NotFound(String),
}

/// Errors raised while instantiating a built-in skill.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkillError {
    #[error("unknown skill: {0}")]
    Unknown(String),

    #[error("invalid configuration for skill '{skill}': {reason}")]
    Config { skill: String, reason: String },
}

/// One argument that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// Arguments did not match a capability's declared parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Names of every offending field, in parameter order.
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid arguments: ")?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} {}", err.field, err.reason)?;
        }
        Ok(())
    }
}

/// Failure reported by a local handler.
///
/// `spoken` optionally carries caller-facing text to use instead of the
/// dispatcher's generic apology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    pub spoken: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            spoken: None,
        }
    }

    /// A failure with its own spoken-safe explanation.
    pub fn spoken(message: impl Into<String>, spoken: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            spoken: Some(spoken.into()),
        }
    }
}
