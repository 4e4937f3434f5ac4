//! Discovery through a local tunnel agent's inspection API.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Deserialize;
use switchboard_types::AddressSource;

use crate::error::ResolveError;
use crate::AddressProvider;

pub const DEFAULT_DISCOVERY_URL: &str = "http://127.0.0.1:4040/api/tunnels";
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<Tunnel>,
}

#[derive(Debug, Deserialize)]
struct Tunnel {
    #[serde(default)]
    proto: String,
    #[serde(default)]
    public_url: String,
}

/// Asks the local tunnel agent for its public https URL.
///
/// One `GET` against the discovery endpoint with a hard timeout covering
/// connect and body. The first tunnel listed with `proto == "https"` wins.
#[derive(Debug, Clone)]
pub struct LocalTunnelProbe {
    endpoint: String,
    client: reqwest::Client,
}

impl LocalTunnelProbe {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn probe(&self) -> Result<String, ResolveError> {
        let response = self.client.get(&self.endpoint).send().await?;
        if !response.status().is_success() {
            return Err(ResolveError::Status(response.status().as_u16()));
        }
        let list: TunnelList = response.json().await?;
        first_https(&list).ok_or(ResolveError::NoHttpsTunnel)
    }
}

impl Default for LocalTunnelProbe {
    fn default() -> Self {
        Self::new(DEFAULT_DISCOVERY_URL, DEFAULT_DISCOVERY_TIMEOUT)
    }
}

impl AddressProvider for LocalTunnelProbe {
    fn name(&self) -> &'static str {
        "local_tunnel_probe"
    }

    fn source(&self) -> AddressSource {
        AddressSource::Discovered
    }

    fn discover(&self) -> BoxFuture<'_, Result<String, ResolveError>> {
        self.probe().boxed()
    }
}

fn first_https(list: &TunnelList) -> Option<String> {
    list.tunnels
        .iter()
        .find(|t| t.proto == "https" && !t.public_url.trim().is_empty())
        .map(|t| t.public_url.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> TunnelList {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn first_https_tunnel_wins() {
        let list = parse(
            r#"{"tunnels":[
                {"proto":"http","public_url":"http://a.example"},
                {"proto":"https","public_url":"https://b.example"},
                {"proto":"https","public_url":"https://c.example"}
            ]}"#,
        );
        assert_eq!(first_https(&list).as_deref(), Some("https://b.example"));
    }

    #[test]
    fn no_https_tunnel() {
        assert_eq!(first_https(&parse(r#"{"tunnels":[]}"#)), None);
        assert_eq!(first_https(&parse(r#"{}"#)), None);
        assert_eq!(
            first_https(&parse(r#"{"tunnels":[{"proto":"tcp","public_url":"tcp://x:1"}]}"#)),
            None
        );
    }
}
