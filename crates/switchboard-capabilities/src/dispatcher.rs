//! Routes invocation requests to capabilities.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use switchboard_datamap::RemoteCallSpec;
use switchboard_types::{CallContext, FunctionResult};

use crate::capability::{CapabilityMode, LocalHandler};
use crate::error::{DispatchError, HandlerError, ValidationError};
use crate::registry::CapabilityRegistry;
use crate::validation::validate_arguments;

/// Default budget for one local handler run.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

/// Spoken fallback texts and the local handler budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub timeout: Duration,
    pub validation_message: String,
    pub failure_message: String,
    pub timeout_message: String,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HANDLER_TIMEOUT,
            validation_message: "Sorry, I didn't catch all the details I need for that. \
                                 Could you say it again?"
                .to_string(),
            failure_message: "Sorry, something went wrong while I was working on that."
                .to_string(),
            timeout_message: "Sorry, that's taking too long right now. \
                              Let's try again in a moment."
                .to_string(),
        }
    }
}

/// Why an invocation produced a fallback instead of a handler result.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    Validation(ValidationError),
    HandlerFailed(String),
    Panicked,
    TimedOut(Duration),
}

impl FallbackReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::HandlerFailed(_) => "handler_failed",
            Self::Panicked => "panicked",
            Self::TimedOut(_) => "timed_out",
        }
    }
}

/// Outcome of [`FunctionDispatcher::invoke`].
#[derive(Debug, Clone)]
pub enum Invocation {
    /// A local handler or skill returned a result.
    Completed(FunctionResult),
    /// The request was answered with a spoken-safe fallback.
    Fallback {
        result: FunctionResult,
        reason: FallbackReason,
    },
    /// The capability runs on the external platform; this is its spec.
    Remote(Arc<RemoteCallSpec>),
}

impl Invocation {
    /// The result to speak back, if this invocation produced one here.
    pub fn result(&self) -> Option<&FunctionResult> {
        match self {
            Self::Completed(result) | Self::Fallback { result, .. } => Some(result),
            Self::Remote(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Fallback { reason, .. } => reason.label(),
            Self::Remote(_) => "remote_handoff",
        }
    }
}

/// Looks up, validates, and runs capabilities from a shared registry.
#[derive(Debug, Clone)]
pub struct FunctionDispatcher {
    registry: Arc<CapabilityRegistry>,
    policy: DispatchPolicy,
}

impl FunctionDispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self::with_policy(registry, DispatchPolicy::default())
    }

    pub fn with_policy(registry: Arc<CapabilityRegistry>, policy: DispatchPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Invokes the named capability.
    ///
    /// Only an unknown name is an error. Invalid arguments, handler
    /// failures, panics, and timeouts all come back as
    /// [`Invocation::Fallback`] so the conversation can continue.
    ///
    /// A handler that outlives the timeout is detached, not cancelled: it
    /// keeps running on the runtime until it finishes on its own.
    pub async fn invoke(
        &self,
        name: &str,
        raw_arguments: &Value,
        ctx: &CallContext,
    ) -> Result<Invocation, DispatchError> {
        let started = Instant::now();
        let capability = self.registry.describe(name).map_err(|_| {
            tracing::warn!(capability = name, call_id = %ctx.call_id, "unknown capability");
            DispatchError::NotFound(name.to_string())
        })?;

        let invocation = match validate_arguments(capability.parameters(), raw_arguments) {
            Err(err) => {
                tracing::info!(
                    capability = name,
                    call_id = %ctx.call_id,
                    error = %err,
                    "rejected invocation arguments"
                );
                Invocation::Fallback {
                    result: FunctionResult::new(self.policy.validation_message.clone()),
                    reason: FallbackReason::Validation(err),
                }
            }
            Ok(args) => match capability.mode() {
                CapabilityMode::LocalHandler(handler) => {
                    self.run_local(name, handler, args, ctx).await
                }
                CapabilityMode::BuiltinSkill { handler, .. } => {
                    self.run_local(name, handler, args, ctx).await
                }
                CapabilityMode::RemoteTemplate(spec) => Invocation::Remote(Arc::clone(spec)),
            },
        };

        tracing::info!(
            capability = name,
            mode = capability.mode().label(),
            call_id = %ctx.call_id,
            outcome = invocation.outcome(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "invocation finished"
        );
        Ok(invocation)
    }

    async fn run_local(
        &self,
        name: &str,
        handler: &LocalHandler,
        args: crate::Arguments,
        ctx: &CallContext,
    ) -> Invocation {
        let task = tokio::spawn(handler.call(args, ctx.clone()));

        match tokio::time::timeout(self.policy.timeout, task).await {
            Ok(Ok(Ok(result))) => Invocation::Completed(result),
            Ok(Ok(Err(err))) => self.handler_failed(name, ctx, err),
            Ok(Err(join_err)) if join_err.is_panic() => {
                tracing::error!(capability = name, call_id = %ctx.call_id, "handler panicked");
                Invocation::Fallback {
                    result: FunctionResult::new(self.policy.failure_message.clone()),
                    reason: FallbackReason::Panicked,
                }
            }
            Ok(Err(join_err)) => {
                self.handler_failed(name, ctx, HandlerError::new(join_err.to_string()))
            }
            Err(_) => {
                tracing::warn!(
                    capability = name,
                    call_id = %ctx.call_id,
                    timeout_ms = self.policy.timeout.as_millis() as u64,
                    "handler timed out"
                );
                Invocation::Fallback {
                    result: FunctionResult::new(self.policy.timeout_message.clone()),
                    reason: FallbackReason::TimedOut(self.policy.timeout),
                }
            }
        }
    }

    fn handler_failed(&self, name: &str, ctx: &CallContext, err: HandlerError) -> Invocation {
        tracing::warn!(
            capability = name,
            call_id = %ctx.call_id,
            error = %err.message,
            "handler failed"
        );
        let spoken = err
            .spoken
            .unwrap_or_else(|| self.policy.failure_message.clone());
        Invocation::Fallback {
            result: FunctionResult::new(spoken),
            reason: FallbackReason::HandlerFailed(err.message),
        }
    }
}
