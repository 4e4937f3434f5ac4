/// Why a single provider could not supply a base URL.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("discovery endpoint returned status {0}")]
    Status(u16),

    #[error("no https tunnel is listed")]
    NoHttpsTunnel,

    #[error("no base URL is configured")]
    NotConfigured,
}
