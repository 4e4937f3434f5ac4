//! Startup resolution of the agent's externally reachable base URL.
//!
//! The voice platform calls back into this process, so every callback URL
//! handed to it must be absolute. [`AddressResolver::resolve`] runs once at
//! startup, walks its providers in order, and returns the first base URL
//! any of them supplies. When all fail the binding is empty and callback
//! URLs degrade to relative paths.

mod error;
mod probe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use switchboard_types::{AddressBinding, AddressSource};

pub use error::ResolveError;
pub use probe::{LocalTunnelProbe, DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_DISCOVERY_URL};

/// A source of a base URL.
pub trait AddressProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Recorded on the binding when this provider succeeds.
    fn source(&self) -> AddressSource;

    fn discover(&self) -> BoxFuture<'_, Result<String, ResolveError>>;
}

/// A base URL taken from configuration.
#[derive(Debug, Clone)]
pub struct StaticAddress {
    base_url: Option<String>,
}

impl StaticAddress {
    /// Blank values count as unconfigured.
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        Self { base_url }
    }
}

impl AddressProvider for StaticAddress {
    fn name(&self) -> &'static str {
        "static_address"
    }

    fn source(&self) -> AddressSource {
        AddressSource::Configured
    }

    fn discover(&self) -> BoxFuture<'_, Result<String, ResolveError>> {
        let result = self.base_url.clone().ok_or(ResolveError::NotConfigured);
        async move { result }.boxed()
    }
}

/// Ordered chain of address providers.
#[derive(Default)]
pub struct AddressResolver {
    providers: Vec<Box<dyn AddressProvider>>,
}

impl std::fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.name()))
            .finish()
    }
}

impl AddressResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard chain: probe the local tunnel agent, then fall back to
    /// the configured base URL.
    pub fn standard(probe: LocalTunnelProbe, configured: Option<String>) -> Self {
        Self::new()
            .with_provider(probe)
            .with_provider(StaticAddress::new(configured))
    }

    /// Appends a provider; earlier providers take precedence.
    pub fn with_provider(mut self, provider: impl AddressProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Resolves the base URL. Never fails; an empty binding is returned
    /// (and a warning logged) when no provider succeeds.
    pub async fn resolve(&self) -> AddressBinding {
        for provider in &self.providers {
            match provider.discover().await {
                Ok(url) => {
                    let binding = AddressBinding::new(url, provider.source());
                    tracing::info!(
                        provider = provider.name(),
                        source = binding.source().as_str(),
                        base_url = binding.base_url(),
                        "resolved public base URL"
                    );
                    return binding;
                }
                Err(ResolveError::NotConfigured) => {
                    tracing::debug!(provider = provider.name(), "no base URL configured");
                }
                Err(err) => {
                    tracing::debug!(provider = provider.name(), error = %err, "address provider failed");
                }
            }
        }

        tracing::warn!("no public base URL resolved; callback URLs will be relative");
        AddressBinding::unbound()
    }
}
