//! Error types for remote-call compilation and evaluation.

/// Errors raised while compiling a [`DataMap`](crate::DataMap).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatamapError {
    /// A declaration is missing or malformed (name, method, parameter).
    #[error("invalid remote call declaration: {0}")]
    Schema(String),

    /// A template string does not follow the substitution grammar.
    #[error("malformed {field} template: {reason}")]
    Template {
        /// Which template was being parsed (`url`, `output`, ...).
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A template references a parameter the DataMap does not declare.
    #[error("{field} template references undeclared parameter '{parameter}'")]
    UndeclaredParameter {
        field: &'static str,
        parameter: String,
    },

    /// A build-time value referenced by `${config.NAME}` was never bound.
    #[error("build-time value '{0}' is not bound")]
    UnboundConfig(String),
}

impl DatamapError {
    /// Returns `true` for errors caused by missing local configuration
    /// rather than by the declaration itself.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnboundConfig(_))
    }
}

/// Failure of the remote call itself, as reported by the executing
/// platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteExecutionError {
    /// The request never produced a response.
    #[error("remote call failed: {0}")]
    Transport(String),

    /// The remote endpoint answered with a non-success status.
    #[error("remote call returned status {0}")]
    Status(u16),
}

/// Error returned when a template string cannot be parsed on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TemplateSyntaxError(pub String);
