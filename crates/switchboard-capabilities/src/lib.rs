//! Capability registry and function dispatch for the Switchboard framework.
//!
//! A [`Capability`] is a named, schema-described operation the AI layer may
//! invoke during a call. Each capability has exactly one
//! [`CapabilityMode`]:
//!
//! - **local handler**: an async function run in this process under a
//!   bounded timeout;
//! - **remote template**: a compiled [`switchboard_datamap::RemoteCallSpec`]
//!   the external platform executes;
//! - **built-in skill**: a local handler produced by a named factory in a
//!   [`SkillCatalog`].
//!
//! The [`CapabilityRegistry`] is filled once at startup and then shared
//! behind an `Arc` by the [`FunctionDispatcher`], which validates arguments
//! and turns every local failure into a spoken-safe fallback.

mod capability;
mod dispatcher;
mod error;
mod registry;
pub mod skills;
mod validation;

pub use capability::{Arguments, Capability, CapabilityMode, LocalHandler};
pub use dispatcher::{
    DispatchPolicy, FallbackReason, FunctionDispatcher, Invocation, DEFAULT_HANDLER_TIMEOUT,
};
pub use error::{
    DispatchError, FieldError, HandlerError, RegistryError, SkillError, ValidationError,
};
pub use registry::{CapabilityRegistry, ManifestEntry};
pub use skills::{SkillCatalog, SkillFactory};
pub use validation::validate_arguments;
