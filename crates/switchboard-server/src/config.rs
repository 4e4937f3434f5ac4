//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub tunnel: TunnelConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub calls: CallsConfig,

    /// API keys. Read from the environment only, never from the file.
    #[serde(skip)]
    pub secrets: Secrets,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "switchboard_capabilities=debug,info".
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

/// SQLite settings, used when summaries go to the database.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Public address discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct TunnelConfig {
    /// Local tunnel agent endpoint listing active tunnels.
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,

    #[serde(default = "default_discovery_timeout_ms")]
    pub timeout_ms: u64,

    /// Base URL used when no tunnel is discovered.
    #[serde(default)]
    pub public_url: Option<String>,
}

/// The agent's persona and capabilities.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Time zone for the `datetime` skill when the caller names none.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Budget for one local handler run.
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    #[serde(default = "default_joke_api_url")]
    pub joke_api_url: String,

    /// Kept below `handler_timeout_ms` so the joke handler can report its
    /// own failure before the dispatcher gives up on it. Larger values are
    /// clamped at load time.
    #[serde(default = "default_joke_timeout_ms")]
    pub joke_timeout_ms: u64,

    #[serde(default = "default_weather_api_url")]
    pub weather_api_url: String,
}

/// Where end-of-call summaries are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryBackend {
    /// One JSON file per call under `calls.dir`.
    #[default]
    JsonDir,
    /// The `call_summaries` table in `database.path`.
    Sqlite,
}

impl std::str::FromStr for SummaryBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json_dir" | "json" => Ok(Self::JsonDir),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown summary store '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallsConfig {
    #[serde(default)]
    pub store: SummaryBackend,

    #[serde(default = "default_calls_dir")]
    pub dir: String,

    /// Seconds without activity after which an unfinished call is
    /// forgotten. 0 disables expiry.
    #[serde(default = "default_session_idle_ttl_secs")]
    pub session_idle_ttl_secs: u64,

    /// Seconds an ended call id is remembered so late function calls
    /// do not reopen it.
    #[serde(default = "default_ended_call_ttl_secs")]
    pub ended_call_ttl_secs: u64,
}

/// Third-party API keys.
#[derive(Clone, Default)]
pub struct Secrets {
    pub weather_api_key: Option<String>,
    pub api_ninjas_key: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "<redacted>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("weather_api_key", &redact(&self.weather_api_key))
            .field("api_ninjas_key", &redact(&self.api_ninjas_key))
            .finish()
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_path() -> String {
    "switchboard.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    4
}

fn default_discovery_url() -> String {
    switchboard_tunnel::DEFAULT_DISCOVERY_URL.to_string()
}

fn default_discovery_timeout_ms() -> u64 {
    switchboard_tunnel::DEFAULT_DISCOVERY_TIMEOUT.as_millis() as u64
}

fn default_agent_name() -> String {
    "Buddy".to_string()
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_handler_timeout_ms() -> u64 {
    switchboard_capabilities::DEFAULT_HANDLER_TIMEOUT.as_millis() as u64
}

fn default_joke_api_url() -> String {
    "https://api.api-ninjas.com/v1/dadjokes".to_string()
}

fn default_joke_timeout_ms() -> u64 {
    4_000
}

fn default_weather_api_url() -> String {
    "https://api.weatherapi.com/v1/current.json".to_string()
}

fn default_calls_dir() -> String {
    "calls".to_string()
}

fn default_session_idle_ttl_secs() -> u64 {
    3_600
}

fn default_ended_call_ttl_secs() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            discovery_url: default_discovery_url(),
            timeout_ms: default_discovery_timeout_ms(),
            public_url: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            default_timezone: default_timezone(),
            handler_timeout_ms: default_handler_timeout_ms(),
            joke_api_url: default_joke_api_url(),
            joke_timeout_ms: default_joke_timeout_ms(),
            weather_api_url: default_weather_api_url(),
        }
    }
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            store: SummaryBackend::default(),
            dir: default_calls_dir(),
            session_idle_ttl_secs: default_session_idle_ttl_secs(),
            ended_call_ttl_secs: default_ended_call_ttl_secs(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Whether the named config file was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Read,
    /// The file does not exist; defaults were used.
    NotFound,
    /// No path was given.
    NotRequested,
}

/// Something the loader adjusted or ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNotice {
    UnparseableOverride { variable: String, value: String },
    JokeTimeoutClamped { configured_ms: u64, clamped_ms: u64 },
}

impl fmt::Display for ConfigNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnparseableOverride { variable, value } => {
                write!(f, "ignoring unparseable override {variable}={value:?}")
            }
            Self::JokeTimeoutClamped {
                configured_ms,
                clamped_ms,
            } => write!(
                f,
                "agent.joke_timeout_ms {configured_ms} is not below agent.handler_timeout_ms; using {clamped_ms}"
            ),
        }
    }
}

/// A loaded configuration plus what happened while loading it.
///
/// Loading runs before the tracing subscriber exists, so the outcome is
/// returned for the caller to log instead of being logged here.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub file: FileStatus,
    pub notices: Vec<ConfigNotice>,
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides.
///
/// Environment variables:
/// - `SWITCHBOARD_HOST`, `SWITCHBOARD_PORT`
/// - `SWITCHBOARD_LOG_LEVEL`, `SWITCHBOARD_LOG_JSON` ("true" or "1")
/// - `SWITCHBOARD_DB_PATH`
/// - `SWITCHBOARD_DISCOVERY_URL`, `SWITCHBOARD_DISCOVERY_TIMEOUT_MS`
/// - `SWITCHBOARD_PUBLIC_URL`, or `SWML_PROXY_URL_BASE` when that is unset
/// - `SWITCHBOARD_AGENT_NAME`, `SWITCHBOARD_DEFAULT_TIMEZONE`
/// - `SWITCHBOARD_SUMMARY_STORE` ("json_dir" or "sqlite"), `SWITCHBOARD_CALLS_DIR`
/// - `SWITCHBOARD_SESSION_IDLE_TTL_SECS`, `SWITCHBOARD_ENDED_CALL_TTL_SECS`
/// - `WEATHER_API_KEY`, `API_NINJAS_KEY` (secrets)
///
/// Unparseable override values are ignored, and a joke timeout that does
/// not fit inside the handler timeout is clamped. Both are reported as
/// [`ConfigNotice`]s.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<LoadedConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit variable lookup.
pub fn load_config_with(
    path: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig, ConfigError> {
    let (mut config, file): (Config, FileStatus) = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => (toml::from_str(&contents)?, FileStatus::Read),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Config::default(), FileStatus::NotFound)
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => (Config::default(), FileStatus::NotRequested),
    };
    let mut notices = Vec::new();

    let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(host) = var("SWITCHBOARD_HOST") {
        parse_into(&mut config.server.host, "SWITCHBOARD_HOST", host, &mut notices);
    }
    if let Some(port) = var("SWITCHBOARD_PORT") {
        parse_into(&mut config.server.port, "SWITCHBOARD_PORT", port, &mut notices);
    }
    if let Some(ms) = var("SWITCHBOARD_DISCOVERY_TIMEOUT_MS") {
        let key = "SWITCHBOARD_DISCOVERY_TIMEOUT_MS";
        parse_into(&mut config.tunnel.timeout_ms, key, ms, &mut notices);
    }
    if let Some(store) = var("SWITCHBOARD_SUMMARY_STORE") {
        parse_into(&mut config.calls.store, "SWITCHBOARD_SUMMARY_STORE", store, &mut notices);
    }
    if let Some(secs) = var("SWITCHBOARD_SESSION_IDLE_TTL_SECS") {
        let key = "SWITCHBOARD_SESSION_IDLE_TTL_SECS";
        parse_into(&mut config.calls.session_idle_ttl_secs, key, secs, &mut notices);
    }
    if let Some(secs) = var("SWITCHBOARD_ENDED_CALL_TTL_SECS") {
        let key = "SWITCHBOARD_ENDED_CALL_TTL_SECS";
        parse_into(&mut config.calls.ended_call_ttl_secs, key, secs, &mut notices);
    }
    if let Some(level) = var("SWITCHBOARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("SWITCHBOARD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(db_path) = var("SWITCHBOARD_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(url) = var("SWITCHBOARD_DISCOVERY_URL") {
        config.tunnel.discovery_url = url;
    }
    if let Some(url) = var("SWITCHBOARD_PUBLIC_URL").or_else(|| var("SWML_PROXY_URL_BASE")) {
        config.tunnel.public_url = Some(url);
    }
    if let Some(name) = var("SWITCHBOARD_AGENT_NAME") {
        config.agent.name = name;
    }
    if let Some(tz) = var("SWITCHBOARD_DEFAULT_TIMEZONE") {
        config.agent.default_timezone = tz;
    }
    if let Some(dir) = var("SWITCHBOARD_CALLS_DIR") {
        config.calls.dir = dir;
    }

    if let Some(notice) = clamp_joke_timeout(&mut config.agent) {
        notices.push(notice);
    }

    config.secrets = Secrets {
        weather_api_key: var("WEATHER_API_KEY"),
        api_ninjas_key: var("API_NINJAS_KEY"),
    };

    Ok(LoadedConfig {
        config,
        file,
        notices,
    })
}

fn parse_into<T: std::str::FromStr>(
    slot: &mut T,
    key: &str,
    value: String,
    notices: &mut Vec<ConfigNotice>,
) {
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => notices.push(ConfigNotice::UnparseableOverride {
            variable: key.to_string(),
            value,
        }),
    }
}

/// The joke handler must give up before the dispatcher does, or its spoken
/// failure is replaced by the generic timeout message.
fn clamp_joke_timeout(agent: &mut AgentConfig) -> Option<ConfigNotice> {
    if agent.joke_timeout_ms < agent.handler_timeout_ms {
        return None;
    }
    let clamped_ms = agent.handler_timeout_ms * 4 / 5;
    let notice = ConfigNotice::JokeTimeoutClamped {
        configured_ms: agent.joke_timeout_ms,
        clamped_ms,
    };
    agent.joke_timeout_ms = clamped_ms;
    Some(notice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let config = load_config_with(None, env(&[])).unwrap().config;
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.agent.name, "Buddy");
        assert_eq!(config.agent.default_timezone, "America/New_York");
        assert_eq!(config.agent.handler_timeout_ms, 5_000);
        assert_eq!(config.tunnel.timeout_ms, 1_000);
        assert_eq!(config.tunnel.discovery_url, "http://127.0.0.1:4040/api/tunnels");
        assert_eq!(config.calls.store, SummaryBackend::JsonDir);
        assert_eq!(config.calls.dir, "calls");
        assert!(config.tunnel.public_url.is_none());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let loaded = load_config_with(path.to_str(), env(&[])).unwrap();
        assert_eq!(loaded.file, FileStatus::NotFound);
        assert_eq!(loaded.config.logging.level, "info");
        assert!(loaded.notices.is_empty());

        let loaded = load_config_with(None, env(&[])).unwrap();
        assert_eq!(loaded.file, FileStatus::NotRequested);
    }

    #[test]
    fn file_values_and_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchboard.toml");
        std::fs::write(
            &path,
            r#"
                [server]
                port = 8080

                [agent]
                name = "Pal"

                [calls]
                store = "sqlite"
            "#,
        )
        .unwrap();

        let loaded = load_config_with(
            path.to_str(),
            env(&[
                ("SWITCHBOARD_PORT", "9090"),
                ("SWITCHBOARD_LOG_JSON", "1"),
                ("SWML_PROXY_URL_BASE", "https://proxy.example"),
                ("WEATHER_API_KEY", "wk"),
            ]),
        )
        .unwrap();
        assert_eq!(loaded.file, FileStatus::Read);
        let config = loaded.config;

        assert_eq!(config.server.port, 9090);
        assert!(config.logging.json);
        assert_eq!(config.agent.name, "Pal");
        assert_eq!(config.calls.store, SummaryBackend::Sqlite);
        assert_eq!(config.tunnel.public_url.as_deref(), Some("https://proxy.example"));
        assert_eq!(config.secrets.weather_api_key.as_deref(), Some("wk"));
        assert!(config.secrets.api_ninjas_key.is_none());
    }

    #[test]
    fn switchboard_public_url_beats_legacy_variable() {
        let config = load_config_with(
            None,
            env(&[
                ("SWITCHBOARD_PUBLIC_URL", "https://new.example"),
                ("SWML_PROXY_URL_BASE", "https://old.example"),
            ]),
        )
        .unwrap()
        .config;
        assert_eq!(config.tunnel.public_url.as_deref(), Some("https://new.example"));
    }

    #[test]
    fn bad_overrides_are_ignored() {
        let loaded = load_config_with(
            None,
            env(&[("SWITCHBOARD_PORT", "eighty"), ("SWITCHBOARD_SUMMARY_STORE", "s3")]),
        )
        .unwrap();
        assert_eq!(loaded.config.server.port, 3000);
        assert_eq!(loaded.config.calls.store, SummaryBackend::JsonDir);

        let ignored: Vec<_> = loaded
            .notices
            .iter()
            .map(|n| match n {
                ConfigNotice::UnparseableOverride { variable, .. } => variable.as_str(),
                other => panic!("unexpected notice {other:?}"),
            })
            .collect();
        assert_eq!(ignored, ["SWITCHBOARD_PORT", "SWITCHBOARD_SUMMARY_STORE"]);
    }

    #[test]
    fn session_ttls_from_file_and_env() {
        let config = load_config_with(None, env(&[])).unwrap().config;
        assert_eq!(config.calls.session_idle_ttl_secs, 3_600);
        assert_eq!(config.calls.ended_call_ttl_secs, 600);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchboard.toml");
        std::fs::write(&path, "[calls]\nsession_idle_ttl_secs = 120\n").unwrap();
        let config = load_config_with(
            path.to_str(),
            env(&[("SWITCHBOARD_ENDED_CALL_TTL_SECS", "30")]),
        )
        .unwrap()
        .config;
        assert_eq!(config.calls.session_idle_ttl_secs, 120);
        assert_eq!(config.calls.ended_call_ttl_secs, 30);
    }

    #[test]
    fn joke_timeout_is_kept_inside_handler_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchboard.toml");
        std::fs::write(
            &path,
            "[agent]\nhandler_timeout_ms = 2000\njoke_timeout_ms = 2000\n",
        )
        .unwrap();

        let loaded = load_config_with(path.to_str(), env(&[])).unwrap();
        assert_eq!(loaded.config.agent.handler_timeout_ms, 2_000);
        assert_eq!(loaded.config.agent.joke_timeout_ms, 1_600);
        assert_eq!(
            loaded.notices,
            [ConfigNotice::JokeTimeoutClamped {
                configured_ms: 2_000,
                clamped_ms: 1_600
            }]
        );
        assert!(loaded.notices[0].to_string().contains("joke_timeout_ms 2000"));

        // Defaults already fit and are left alone.
        let loaded = load_config_with(None, env(&[])).unwrap();
        assert_eq!(loaded.config.agent.joke_timeout_ms, 4_000);
        assert!(loaded.notices.is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(matches!(
            load_config_with(path.to_str(), env(&[])),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn secrets_are_redacted() {
        let secrets = Secrets {
            weather_api_key: Some("super-secret".into()),
            api_ninjas_key: None,
        };
        let shown = format!("{secrets:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("<redacted>"));
        assert!(shown.contains("<unset>"));
    }
}
