//! # HTTP Route Tests
//!
//! Drive the full router in-process with `tower::ServiceExt::oneshot`.
//! Executors are attached straight to the engine through in-memory channels.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use relay_core::adapters::channel;
use relay_core::{DispatchConfig, ExecutorChannel, RelayEngine};
use relay_gateway::{build_router, GatewayConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> (Arc<RelayEngine>, Router) {
    let config = GatewayConfig::default();
    let engine = Arc::new(RelayEngine::new(DispatchConfig::default()).unwrap());
    let router = build_router(Arc::clone(&engine), &config);
    (engine, router)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn rpc(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (_, router) = setup();
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_status_reports_engine_counts() {
    let (engine, router) = setup();
    let (executor, _outbound) = channel(8);
    engine.register(executor);

    let response = router
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = body_json(response).await;

    assert_eq!(status["connectedExecutors"], 1);
    assert_eq!(status["pendingRequests"], 0);
    assert_eq!(status["stats"]["registered"], 0);
}

#[tokio::test]
async fn test_tool_call_without_executor_is_tool_error() {
    let (_, router) = setup();
    let response = router
        .oneshot(rpc(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "browser-execute", "arguments": {"code": "1+1"}}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"]["isError"], true);
    assert_eq!(
        body["result"]["content"][0]["text"],
        "no browser executor is connected"
    );
}

#[tokio::test]
async fn test_tool_call_round_trip_through_executor() {
    let (engine, router) = setup();
    let (executor, mut outbound) = channel(8);
    engine.register(executor.clone());

    // Play the executor: answer the first command that shows up
    let responder = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            let frame: Value = serde_json::from_str(&outbound.recv().await.unwrap()).unwrap();
            assert_eq!(frame["kind"], "create-post");
            let reply = json!({"type": "command_result", "id": frame["id"], "result": {"success": true}});
            engine.handle_inbound(executor.id(), &reply.to_string());
        }
    });

    let response = router
        .oneshot(rpc(json!({
            "jsonrpc": "2.0",
            "id": "post-1",
            "method": "tools/call",
            "params": {"name": "create-post", "arguments": {"content": "hello"}}
        })))
        .await
        .unwrap();
    responder.await.unwrap();

    let body = body_json(response).await;
    assert_eq!(body["id"], "post-1");
    assert_eq!(body["result"]["isError"], false);
    assert_eq!(body["result"]["content"][0]["text"], r#"{"success":true}"#);
    assert_eq!(engine.stats().succeeded, 1);
}

#[tokio::test]
async fn test_parse_error() {
    let (_, router) = setup();
    let response = router
        .oneshot(
            Request::post("/mcp")
                .header("content-type", "application/json")
                .body(Body::from("{oops"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(body_json(response).await["error"]["code"], -32700);
}

#[tokio::test]
async fn test_notification_is_accepted_without_body() {
    let (_, router) = setup();
    let response = router
        .oneshot(rpc(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_metrics_exposition() {
    relay_telemetry::register_metrics().unwrap();
    let (_, router) = setup();
    let response = router
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("relay_requests_pending"));
}

#[tokio::test]
async fn test_ws_route_requires_upgrade() {
    let (_, router) = setup();
    let response = router
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
