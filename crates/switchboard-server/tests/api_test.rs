use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use switchboard_calls::JsonDirSummaryStore;
use switchboard_server::config::{Config, Secrets};
use switchboard_server::{app, background, build_state, AppState};
use switchboard_types::{AddressBinding, AddressSource};
use tower::ServiceExt;

fn state_with(secrets: Secrets, binding: AddressBinding, calls_dir: &std::path::Path) -> AppState {
    let config = Config {
        secrets,
        ..Config::default()
    };
    build_state(
        &config,
        binding,
        Arc::new(JsonDirSummaryStore::new(calls_dir)),
    )
    .unwrap()
}

fn test_app(calls_dir: &std::path::Path) -> Router {
    let secrets = Secrets {
        weather_api_key: Some("wk-test".into()),
        api_ninjas_key: None,
    };
    app(state_with(
        secrets,
        AddressBinding::new("https://abc123.ngrok.example/", AddressSource::Discovered),
        calls_dir,
    ))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = send(
        test_app(dir.path()),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], "0.0.1");
}

#[tokio::test]
async fn test_agent_document_uses_resolved_address() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = send(
        test_app(dir.path()),
        Request::builder().uri("/agent").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Buddy");
    assert_eq!(json["web_hook_url"], "https://abc123.ngrok.example/swaig");
    assert_eq!(json["post_prompt_url"], "https://abc123.ngrok.example/post_prompt");
    assert_eq!(json["address_source"], "discovered");
    assert!(json["prompt"].as_str().unwrap().starts_with("## Personality"));
    assert!(json["post_prompt"]
        .as_str()
        .unwrap()
        .starts_with("Summarize this conversation"));

    let names: Vec<_> = json["functions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        ["tell_joke", "get_weather", "get_current_time", "get_current_date", "calculate"]
    );

    let weather = &json["remote_functions"][0];
    assert_eq!(weather["function"], "get_weather");
    assert_eq!(
        weather["data_map"]["webhooks"][0]["url"],
        "https://api.weatherapi.com/v1/current.json?key=wk-test&q=${enc:args.city}"
    );
}

#[tokio::test]
async fn test_agent_document_degrades_to_relative_urls() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(state_with(
        Secrets::default(),
        AddressBinding::unbound(),
        dir.path(),
    ));
    let (_, json) = send(
        app,
        Request::builder().uri("/agent").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(json["web_hook_url"], "/swaig");
    assert_eq!(json["address_source"], "none");
    assert_eq!(json["remote_functions"], json!([]));
}

#[tokio::test]
async fn test_swaig_runs_local_skill() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = send(
        test_app(dir.path()),
        post_json(
            "/swaig",
            json!({
                "function": "calculate",
                "call_id": "call-1",
                "argument": {"parsed": [{"expression": "(2 + 3) * 4"}], "raw": "{}"}
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["response"], "(2 + 3) * 4 equals 20.");
}

#[tokio::test]
async fn test_swaig_falls_back_to_raw_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let (_, json) = send(
        test_app(dir.path()),
        post_json(
            "/swaig",
            json!({
                "function": "calculate",
                "argument": {"raw": "{\"expression\": \"7 % 4\"}"}
            }),
        ),
    )
    .await;

    assert_eq!(json["response"], "7 % 4 equals 3.");
}

#[tokio::test]
async fn test_swaig_validation_failure_is_spoken() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = send(
        test_app(dir.path()),
        post_json("/swaig", json!({"function": "calculate", "argument": {"parsed": [{}]}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["response"].as_str().unwrap().starts_with("Sorry"));
}

#[tokio::test]
async fn test_swaig_remote_function_returns_handoff() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = send(
        test_app(dir.path()),
        post_json(
            "/swaig",
            json!({"function": "get_weather", "argument": {"parsed": [{"city": "Paris"}]}}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["function"], "get_weather");
    assert!(json["data_map"]["output"]["response"]
        .as_str()
        .unwrap()
        .contains("${args.city}"));
}

#[tokio::test]
async fn test_swaig_unknown_function_is_404_with_spoken_response() {
    let dir = tempfile::tempdir().unwrap();
    let (status, json) = send(
        test_app(dir.path()),
        post_json("/swaig", json!({"function": "order_pizza"})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["response"], switchboard_server::api::UNKNOWN_FUNCTION_RESPONSE);
}

#[tokio::test]
async fn test_swaig_missing_function_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _) = send(
        test_app(dir.path()),
        post_json("/swaig", json!({"call_id": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_prompt_saves_summary_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path());

    let (status, json) = send(
        app.clone(),
        post_json(
            "/post_prompt",
            json!({
                "call_id": "call-42",
                "post_prompt_data": {"substituted": "Caller asked for a joke and laughed."}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["call_id"], "call-42");

    let saved = std::fs::read_to_string(dir.path().join("call-42.json")).unwrap();
    let saved: Value = serde_json::from_str(&saved).unwrap();
    assert_eq!(
        saved["post_prompt_data"]["substituted"],
        "Caller asked for a joke and laughed."
    );
}

#[tokio::test]
async fn test_post_prompt_accepts_non_json_body() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/post_prompt")
        .body(Body::from("definitely not json"))
        .unwrap();

    let (status, json) = send(test_app(dir.path()), request).await;
    assert_eq!(status, StatusCode::OK);

    let key = json["call_id"].as_str().unwrap();
    let saved = std::fs::read_to_string(dir.path().join(format!("{key}.json"))).unwrap();
    assert!(saved.contains("definitely not json"));
}

#[tokio::test(start_paused = true)]
async fn test_expiry_task_drops_abandoned_calls() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.calls.session_idle_ttl_secs = 60;
    config.calls.ended_call_ttl_secs = 30;
    let state = build_state(
        &config,
        AddressBinding::unbound(),
        Arc::new(JsonDirSummaryStore::new(dir.path())),
    )
    .unwrap();
    assert_eq!(state.lifecycle.policy().idle_ttl, Duration::from_secs(60));
    assert_eq!(state.lifecycle.policy().ended_ttl, Duration::from_secs(30));

    // The summary for this call never arrives.
    state.lifecycle.start_call("abandoned");
    tokio::spawn(background::start_session_expiry_task(
        Arc::clone(&state.lifecycle),
        config.calls.session_idle_ttl_secs,
    ));

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(state.lifecycle.active_calls(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(state.lifecycle.active_calls(), 0);
}
