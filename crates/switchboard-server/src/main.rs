//! Switchboard binary: resolves the public address, builds the agent, and
//! serves its webhooks until SIGINT or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use switchboard_calls::{JsonDirSummaryStore, SqliteSummaryStore, SummaryStore};
use switchboard_server::config::{self, Config, FileStatus, LoggingConfig, SummaryBackend};
use switchboard_server::{app, background, build_state};
use switchboard_tunnel::{AddressResolver, LocalTunnelProbe};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "switchboard.toml";

/// First CLI argument, then `SWITCHBOARD_CONFIG_PATH`, then the default.
fn config_path() -> (String, &'static str) {
    let non_blank = |value: &String| !value.trim().is_empty();
    if let Some(path) = std::env::args().nth(1).filter(non_blank) {
        (path, "cli-arg")
    } else if let Some(path) = std::env::var("SWITCHBOARD_CONFIG_PATH")
        .ok()
        .filter(non_blank)
    {
        (path, "env-var")
    } else {
        (DEFAULT_CONFIG_PATH.to_string(), "default")
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn open_sqlite_store(config: &Config) -> Result<SqliteSummaryStore, Box<dyn std::error::Error>> {
    let pool = switchboard_db::create_pool(
        &config.database.path,
        switchboard_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )?;
    let applied = switchboard_db::run_migrations(&*pool.get()?)?;
    if applied > 0 {
        tracing::info!(count = applied, path = %config.database.path, "applied database migrations");
    }
    Ok(SqliteSummaryStore::new(pool))
}

fn summary_store(config: &Config) -> Arc<dyn SummaryStore> {
    match config.calls.store {
        SummaryBackend::JsonDir => {
            tracing::info!(dir = %config.calls.dir, "saving call summaries as JSON files");
            Arc::new(JsonDirSummaryStore::new(&config.calls.dir))
        }
        SummaryBackend::Sqlite => match open_sqlite_store(config) {
            Ok(store) => Arc::new(store),
            Err(e) => panic!("cannot open summary database {}: {e}", config.database.path),
        },
    }
}

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    let (path, source) = config_path();

    let loaded = config::load_config(Some(path.as_str()))
        .expect("cannot start without a readable configuration");
    init_tracing(&loaded.config.logging);

    if let Ok(env_file) = &dotenv {
        tracing::info!(path = %env_file.display(), "loaded environment file");
    }
    match loaded.file {
        FileStatus::NotFound => {
            tracing::info!(%path, source, "config file not found, using defaults");
        }
        _ => tracing::info!(%path, source, "loaded configuration"),
    }
    for notice in &loaded.notices {
        tracing::warn!(%notice, "configuration adjusted");
    }
    let config = loaded.config;
    tracing::debug!(?config, "effective configuration");

    let binding = AddressResolver::standard(
        LocalTunnelProbe::new(
            config.tunnel.discovery_url.clone(),
            Duration::from_millis(config.tunnel.timeout_ms),
        ),
        config.tunnel.public_url.clone(),
    )
    .resolve()
    .await;

    let state = build_state(&config, binding, summary_store(&config))
        .expect("failed to register agent capabilities");
    tokio::spawn(background::start_session_expiry_task(
        Arc::clone(&state.lifecycle),
        config.calls.session_idle_ttl_secs,
    ));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind listen address");
    tracing::info!(
        %addr,
        agent = %config.agent.name,
        web_hook_url = %state.binding.url_for("/swaig"),
        "switchboard listening"
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let signal = shutdown_signal().await;
            tracing::info!(signal, "shutting down");
        })
        .await
        .expect("server error");
}

/// Resolves with the name of the first shutdown signal received.
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "SIGINT"
    }
}
