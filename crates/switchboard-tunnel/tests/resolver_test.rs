use std::time::{Duration, Instant};

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use switchboard_tunnel::{AddressResolver, LocalTunnelProbe, StaticAddress};
use switchboard_types::AddressSource;
use tokio::net::TcpListener;

/// Serves `body` at `/api/tunnels` on an ephemeral port and returns the
/// discovery URL.
async fn spawn_tunnel_agent(body: Value) -> String {
    let app = Router::new().route("/api/tunnels", get(move || async move { Json(body) }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/tunnels")
}

/// A port with nothing listening on it.
async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/tunnels")
}

#[tokio::test]
async fn test_discovered_tunnel_wins_over_configured() {
    let url = spawn_tunnel_agent(json!({
        "tunnels": [
            {"proto": "http", "public_url": "http://plain.ngrok.example"},
            {"proto": "https", "public_url": "https://secure.ngrok.example/"}
        ]
    }))
    .await;

    let resolver = AddressResolver::standard(
        LocalTunnelProbe::new(url, Duration::from_secs(1)),
        Some("https://configured.example".into()),
    );
    let binding = resolver.resolve().await;

    assert_eq!(binding.source(), AddressSource::Discovered);
    assert_eq!(binding.base_url(), "https://secure.ngrok.example");
    assert_eq!(
        binding.url_for("/swaig"),
        "https://secure.ngrok.example/swaig"
    );
}

#[tokio::test]
async fn test_no_https_tunnel_falls_back_to_configured() {
    let url = spawn_tunnel_agent(json!({
        "tunnels": [{"proto": "http", "public_url": "http://plain.ngrok.example"}]
    }))
    .await;

    let resolver = AddressResolver::standard(
        LocalTunnelProbe::new(url, Duration::from_secs(1)),
        Some("https://configured.example/".into()),
    );
    let binding = resolver.resolve().await;

    assert_eq!(binding.source(), AddressSource::Configured);
    assert_eq!(binding.base_url(), "https://configured.example");
}

#[tokio::test]
async fn test_unreachable_probe_and_no_config_is_unbound() {
    let resolver = AddressResolver::standard(
        LocalTunnelProbe::new(closed_port_url().await, Duration::from_secs(1)),
        Some("   ".into()),
    );
    let binding = resolver.resolve().await;

    assert_eq!(binding.source(), AddressSource::None);
    assert!(!binding.is_bound());
    assert_eq!(binding.url_for("/post_prompt"), "/post_prompt");
}

#[tokio::test]
async fn test_hanging_probe_is_bounded_by_timeout() {
    // Accepts connections but never answers.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let resolver = AddressResolver::new()
        .with_provider(LocalTunnelProbe::new(
            format!("http://{addr}/api/tunnels"),
            Duration::from_millis(200),
        ))
        .with_provider(StaticAddress::new(Some("https://fallback.example".into())));

    let started = Instant::now();
    let binding = resolver.resolve().await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(binding.source(), AddressSource::Configured);
    assert_eq!(binding.base_url(), "https://fallback.example");
}

#[tokio::test]
async fn test_malformed_discovery_body_falls_through() {
    let url = spawn_tunnel_agent(json!(["not", "a", "tunnel", "list"])).await;
    let resolver =
        AddressResolver::standard(LocalTunnelProbe::new(url, Duration::from_secs(1)), None);

    let binding = resolver.resolve().await;
    assert_eq!(binding.source(), AddressSource::None);
}
