//! Relay gateway service - HTTP tool frontend plus executor WebSocket.
//!
//! Routes:
//! - `POST /mcp`: JSON-RPC tool frontend
//! - `GET /ws`: executor connections
//! - `GET /status`: engine status and pending table counters
//! - `GET /health`: liveness
//! - `GET /metrics`: Prometheus text exposition

use crate::config::{ConfigError, CorsConfig, GatewayConfig, WebSocketConfig};
use crate::error::GatewayError;
use crate::rpc::RpcHandler;
use crate::ws::ExecutorSession;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use relay_core::{CommandDispatcher, RelayEngine};
use relay_telemetry::{encode_metrics, EXECUTORS_CONNECTED, REQUESTS_PENDING};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Gateway service state
pub struct RelayGatewayService {
    config: GatewayConfig,
    engine: Arc<RelayEngine>,
    shutdown_tx: watch::Sender<bool>,
}

impl RelayGatewayService {
    /// Create a new gateway service
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let engine = RelayEngine::new(config.dispatch.clone())
            .map_err(|e| ConfigError::Dispatch(e.to_string()))?;
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            engine: Arc::new(engine),
            shutdown_tx,
        })
    }

    pub fn engine(&self) -> Arc<RelayEngine> {
        Arc::clone(&self.engine)
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.engine), &self.config)
    }

    /// Bind and serve until [`shutdown`](Self::shutdown) is called.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: tokio::net::TcpListener) -> Result<(), GatewayError> {
        let addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;
        info!(addr = %addr, "Starting relay gateway");

        let reaper = self.engine.spawn_reaper(self.shutdown_tx.subscribe());

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                // Sender lives as long as the service, so this only returns on shutdown
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                info!("Received shutdown signal");
            })
            .await;

        // Stop the reaper even if the server failed on its own
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = reaper.await {
            error!(error = %e, "Reaper task failed");
        }

        result.map_err(|e| GatewayError::Serve(e.to_string()))?;
        info!("Relay gateway stopped");
        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    engine: Arc<RelayEngine>,
    rpc: Arc<RpcHandler>,
    websocket: WebSocketConfig,
}

/// Router with every route and middleware layer
pub fn build_router(engine: Arc<RelayEngine>, config: &GatewayConfig) -> Router {
    let dispatcher: Arc<dyn CommandDispatcher> = engine.clone();
    let state = AppState {
        rpc: Arc::new(RpcHandler::new(dispatcher, config.http.max_batch_size)),
        engine,
        websocket: config.websocket.clone(),
    };

    let router = Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/ws", get(handle_ws))
        .route("/status", get(handle_status))
        .route("/health", get(health_check))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http());

    let router = match create_cors_layer(&config.cors) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// Create CORS layer from gateway config
fn create_cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.enabled {
        return None;
    }

    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        Some(cors.allow_origin(Any))
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        Some(cors.allow_origin(origins))
    }
}

/// Handle a JSON-RPC body
async fn handle_mcp(State(state): State<AppState>, body: String) -> Response {
    match state.rpc.handle_body(&body).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        // Notifications only
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Upgrade an executor connection
async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        let (session, outbound) = ExecutorSession::open(state.engine, state.websocket);
        session.run(outbound, socket).await;
    })
}

async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.engine.status();
    Json(serde_json::json!({
        "connectedExecutors": status.connected_executors,
        "pendingRequests": status.pending_requests,
        "stats": state.engine.stats(),
    }))
}

async fn handle_metrics(State(state): State<AppState>) -> Response {
    let status = state.engine.status();
    EXECUTORS_CONNECTED.set(status.connected_executors as i64);
    REQUESTS_PENDING.set(status.pending_requests as i64);

    match encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "browser-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
