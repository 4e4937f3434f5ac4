//! Capabilities and their execution modes.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::{Map, Value};
use switchboard_datamap::RemoteCallSpec;
use switchboard_types::{CallContext, FunctionResult, ParameterSpec};

use crate::error::HandlerError;

/// Validated arguments handed to a local handler.
pub type Arguments = Map<String, Value>;

type HandlerFn = dyn Fn(Arguments, CallContext) -> BoxFuture<'static, Result<FunctionResult, HandlerError>>
    + Send
    + Sync;

/// A function this process runs when a capability is invoked.
#[derive(Clone)]
pub struct LocalHandler {
    inner: Arc<HandlerFn>,
}

impl LocalHandler {
    /// Wraps an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arguments, CallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<FunctionResult, HandlerError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |args, ctx| f(args, ctx).boxed()),
        }
    }

    /// Wraps a blocking function. It runs on the blocking thread pool, so
    /// it may do synchronous I/O without stalling other calls.
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(Arguments, CallContext) -> Result<FunctionResult, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let f = Arc::new(f);
        Self::new(move |args, ctx| {
            let f = Arc::clone(&f);
            async move {
                tokio::task::spawn_blocking(move || f(args, ctx))
                    .await
                    .map_err(|e| HandlerError::new(format!("blocking handler failed: {e}")))?
            }
        })
    }

    pub(crate) fn call(
        &self,
        args: Arguments,
        ctx: CallContext,
    ) -> BoxFuture<'static, Result<FunctionResult, HandlerError>> {
        (self.inner)(args, ctx)
    }
}

impl fmt::Debug for LocalHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHandler").finish_non_exhaustive()
    }
}

/// How a capability executes. Fixed at registration.
#[derive(Debug, Clone)]
pub enum CapabilityMode {
    /// Runs in this process.
    LocalHandler(LocalHandler),
    /// Handed to the external platform as a compiled spec.
    RemoteTemplate(Arc<RemoteCallSpec>),
    /// Produced by a built-in skill factory.
    BuiltinSkill {
        skill: String,
        config: Value,
        handler: LocalHandler,
    },
}

impl CapabilityMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::LocalHandler(_) => "local_handler",
            Self::RemoteTemplate(_) => "remote_template",
            Self::BuiltinSkill { .. } => "builtin_skill",
        }
    }
}

/// A named, schema-described operation the AI layer may invoke.
#[derive(Debug, Clone)]
pub struct Capability {
    name: String,
    description: String,
    parameters: Vec<ParameterSpec>,
    mode: CapabilityMode,
}

impl Capability {
    pub fn local(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ParameterSpec>,
        handler: LocalHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            mode: CapabilityMode::LocalHandler(handler),
        }
    }

    /// A remote capability takes its name, description, and parameters
    /// from the compiled spec, so its templates can only reference what
    /// the capability declares.
    pub fn remote(spec: RemoteCallSpec) -> Self {
        Self {
            name: spec.name().to_string(),
            description: spec.description().to_string(),
            parameters: spec.parameters().to_vec(),
            mode: CapabilityMode::RemoteTemplate(Arc::new(spec)),
        }
    }

    pub(crate) fn skill(
        skill: &str,
        config: &Value,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ParameterSpec>,
        handler: LocalHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            mode: CapabilityMode::BuiltinSkill {
                skill: skill.to_string(),
                config: config.clone(),
                handler,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn mode(&self) -> &CapabilityMode {
        &self.mode
    }
}
