//! Declarative remote calls ("DataMap") for the Switchboard framework.
//!
//! A [`DataMap`] describes an HTTP call the external voice platform runs on
//! the agent's behalf: parameters, a method and URL template, a success
//! output template, and a fallback output template. [`DataMap::compile`]
//! validates the declaration and produces an immutable [`RemoteCallSpec`].
//!
//! # Two substitution phases
//!
//! Values enter a remote call at two distinct times, and the two never mix:
//!
//! - **build time**: `${config.NAME}` tokens are replaced once, inside
//!   `compile()`, by values bound with [`DataMap::bind`]. URL values are
//!   percent-encoded so a baked-in secret can never form a token.
//! - **call time**: `${args.X}`, `${enc:args.X}`, and `${response.path}`
//!   survive compilation untouched and are resolved by the platform for
//!   every invocation.
//!
//! [`RemoteCallTemplate::resolve`] renders outputs exactly as the platform
//! does, including the switch to the fallback template when a response path
//! cannot be resolved or the call failed.

mod builder;
mod error;
mod spec;
mod template;

pub use builder::{DataMap, DEFAULT_FALLBACK};
pub use error::{DatamapError, RemoteExecutionError, TemplateSyntaxError};
pub use spec::{
    FallbackCause, HttpMethod, RemoteCallSpec, RemoteCallTemplate, RemoteOutcome, Resolution,
};
pub use template::{Segment, Template, Unresolved};
