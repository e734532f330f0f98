use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Json;
use conductor_config::{Value, ValueMap};
use conductor_client::{CapabilityClient, HttpCapabilityClient, Invocation, InvocationError};
use conductor_registry::{ActionTemplate, CapabilityRegistry, Method};
use serde_json::json;

async fn ping(headers: HeaderMap, Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
  let step = headers
    .get("x-step-id")
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_string();
  Json(json!({"output": {"pong": body["msg"], "step": step}, "cost": 0.5}))
}

async fn item(
  Path(id): Path<String>,
  Query(query): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
  Json(json!({"id": id, "query": query}))
}

async fn slow() -> Json<serde_json::Value> {
  tokio::time::sleep(Duration::from_millis(500)).await;
  Json(json!({"late": true}))
}

async fn fail() -> (StatusCode, &'static str) {
  (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn garbage() -> &'static str {
  "definitely not json"
}

async fn spawn_server() -> SocketAddr {
  let app = Router::new()
    .route("/ping", post(ping))
    .route("/items/:id", get(item))
    .route("/slow", post(slow))
    .route("/fail", post(fail))
    .route("/garbage", post(garbage))
    .route("/health", get(|| async { "ok" }));

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });
  addr
}

/// An address nothing listens on.
async fn closed_addr() -> SocketAddr {
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  listener.local_addr().unwrap()
}

fn invocation(addr: SocketAddr, endpoint: &str, method: Method, parameters: serde_json::Value) -> Invocation {
  let parameters: ValueMap = match Value::from(parameters) {
    Value::Map(map) => map,
    _ => ValueMap::new(),
  };
  Invocation {
    intent_id: "i-1".to_string(),
    step_id: "s1".to_string(),
    target: Arc::new(ActionTemplate {
      capability: "echo".to_string(),
      action: "ping".to_string(),
      base_url: format!("http://{}", addr),
      endpoint: endpoint.to_string(),
      method,
      parameters: vec![],
      timeout_ms: None,
    }),
    parameters,
  }
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_post_sends_json_body() {
  let addr = spawn_server().await;
  let client = HttpCapabilityClient::new();

  let reply = client
    .invoke(&invocation(addr, "/ping", Method::Post, json!({"msg": "hi"})), TIMEOUT)
    .await
    .unwrap();

  assert_eq!(reply.output.to_json(), json!({"pong": "hi", "step": "s1"}));
  assert_eq!(reply.cost, Some(0.5));
}

#[tokio::test]
async fn test_get_fills_path_and_query() {
  let addr = spawn_server().await;
  let client = HttpCapabilityClient::new();

  let reply = client
    .invoke(
      &invocation(addr, "/items/{id}", Method::Get, json!({"id": "42", "verbose": true})),
      TIMEOUT,
    )
    .await
    .unwrap();

  assert_eq!(
    reply.output.to_json(),
    json!({"id": "42", "query": {"verbose": "true"}})
  );
  assert_eq!(reply.cost, None);
}

#[tokio::test]
async fn test_timeout() {
  let addr = spawn_server().await;
  let client = HttpCapabilityClient::new();

  let err = client
    .invoke(&invocation(addr, "/slow", Method::Post, json!({})), Duration::from_millis(50))
    .await
    .unwrap_err();

  assert!(matches!(err, InvocationError::Timeout { timeout_ms: 50, .. }));
  assert!(err.triggers_fallback());
}

#[tokio::test]
async fn test_unreachable_is_transport() {
  let addr = closed_addr().await;
  let client = HttpCapabilityClient::new();

  let err = client
    .invoke(&invocation(addr, "/ping", Method::Post, json!({})), TIMEOUT)
    .await
    .unwrap_err();

  assert!(matches!(err, InvocationError::Transport { .. }), "got {:?}", err);
  assert!(err.triggers_fallback());
}

#[tokio::test]
async fn test_error_status_and_invalid_reply_are_terminal() {
  let addr = spawn_server().await;
  let client = HttpCapabilityClient::new();

  let status = client
    .invoke(&invocation(addr, "/fail", Method::Post, json!({})), TIMEOUT)
    .await
    .unwrap_err();
  assert!(matches!(status, InvocationError::Status { status: 500, ref body, .. } if body == "boom"));
  assert!(!status.triggers_fallback());

  let garbage = client
    .invoke(&invocation(addr, "/garbage", Method::Post, json!({})), TIMEOUT)
    .await
    .unwrap_err();
  assert!(matches!(garbage, InvocationError::InvalidReply { .. }));
  assert!(!garbage.triggers_fallback());
}

#[tokio::test]
async fn test_health_probe() {
  let addr = spawn_server().await;
  let down = closed_addr().await;
  let registry = CapabilityRegistry::from_json_str(
    &json!({
      "version": "1",
      "capabilities": {
        "up": {"base_url": format!("http://{}", addr), "actions": {}},
        "down": {"base_url": format!("http://{}", down), "actions": {}}
      }
    })
    .to_string(),
  )
  .unwrap();
  let client = HttpCapabilityClient::new();

  let up = client
    .health(registry.describe("up").unwrap(), TIMEOUT)
    .await;
  assert!(up.healthy);
  assert_eq!(up.status, Some(200));

  let down = client
    .health(registry.describe("down").unwrap(), TIMEOUT)
    .await;
  assert!(!down.healthy);
  assert!(down.error.is_some());
}
