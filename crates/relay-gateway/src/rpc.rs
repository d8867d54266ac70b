//! JSON-RPC 2.0 tool frontend.
//!
//! Methods:
//! - `initialize`: server info and capabilities
//! - `tools/list`: the tool catalog
//! - `tools/call`: dispatch a command and wait for the executor
//! - `ping`: liveness
//!
//! A dispatch failure is a normal tool result with `isError: true`; only
//! protocol problems become JSON-RPC errors.

use crate::error::{ApiError, ApiResult};
use crate::tools;
use relay_core::{CommandDispatcher, DispatchResult};
use relay_telemetry::{HistogramTimer, TOOL_CALLS, TOOL_CALL_DURATION};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Protocol revision reported when the client does not ask for one
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "browser-relay";

pub struct RpcHandler {
    dispatcher: Arc<dyn CommandDispatcher>,
    max_batch_size: usize,
}

impl RpcHandler {
    pub fn new(dispatcher: Arc<dyn CommandDispatcher>, max_batch_size: usize) -> Self {
        Self {
            dispatcher,
            max_batch_size,
        }
    }

    /// Handle a raw request body.
    ///
    /// Returns `None` when nothing needs to be sent back (notifications only).
    pub async fn handle_body(&self, body: &str) -> Option<Value> {
        let request: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => return Some(error_response(Value::Null, ApiError::parse_error(e.to_string()))),
        };

        match request {
            Value::Array(requests) => {
                if requests.is_empty() {
                    return Some(error_response(
                        Value::Null,
                        ApiError::invalid_request("empty batch"),
                    ));
                }
                if requests.len() > self.max_batch_size {
                    return Some(error_response(
                        Value::Null,
                        ApiError::invalid_request(format!(
                            "batch of {} exceeds limit {}",
                            requests.len(),
                            self.max_batch_size
                        )),
                    ));
                }

                // Tool calls in a batch run concurrently; each waits on its own executor reply
                let responses: Vec<Value> =
                    futures::future::join_all(requests.iter().map(|req| self.process_single(req)))
                        .await
                        .into_iter()
                        .flatten()
                        .collect();

                (!responses.is_empty()).then_some(Value::Array(responses))
            }
            single => self.process_single(&single).await,
        }
    }

    /// Process a single JSON-RPC request
    async fn process_single(&self, request: &Value) -> Option<Value> {
        let Some(object) = request.as_object() else {
            return Some(error_response(
                Value::Null,
                ApiError::invalid_request("request must be an object"),
            ));
        };

        let id = object.get("id").cloned();
        if let Some(ref id_val) = id {
            if !id_val.is_string() && !id_val.is_number() && !id_val.is_null() {
                return Some(error_response(
                    Value::Null,
                    ApiError::invalid_request("id must be string or number"),
                ));
            }
        }

        if object.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Some(error_response(
                id.unwrap_or(Value::Null),
                ApiError::invalid_request("jsonrpc must be \"2.0\""),
            ));
        }

        let Some(method) = object.get("method").and_then(Value::as_str) else {
            return Some(error_response(
                id.unwrap_or(Value::Null),
                ApiError::invalid_request("missing method"),
            ));
        };

        // No id means notification: nothing is executed and nothing is returned
        let Some(id) = id else {
            debug!(method, "Ignoring notification");
            return None;
        };

        let response = match self.route_method(method, object.get("params")).await {
            Ok(result) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result
            }),
            Err(e) => {
                debug!(method, code = e.code, error = %e.message, "Request rejected");
                error_response(id, e)
            }
        };
        Some(response)
    }

    async fn route_method(&self, method: &str, params: Option<&Value>) -> ApiResult<Value> {
        match method {
            "initialize" => Ok(self.initialize(params)),
            "tools/list" => Ok(tools::list()),
            "tools/call" => self.call_tool(params).await,
            "ping" => Ok(json!({})),
            _ => Err(ApiError::method_not_found(method)),
        }
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let protocol_version = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        info!(protocol_version, "Tool client initialized");

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    async fn call_tool(&self, params: Option<&Value>) -> ApiResult<Value> {
        let params = params.ok_or_else(|| ApiError::invalid_params("missing params"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::invalid_params("missing tool name"))?;
        let tool = tools::find(name)
            .ok_or_else(|| ApiError::invalid_params(format!("unknown tool '{}'", name)))?;

        let command = match tool.command(params.get("arguments")) {
            Ok(command) => command,
            Err(e) => {
                TOOL_CALLS.with_label_values(&[tool.name, "invalid"]).inc();
                return Err(e);
            }
        };

        let result = {
            let _timer = HistogramTimer::new(&TOOL_CALL_DURATION, tool.name);
            self.dispatcher.dispatch(command).await
        };

        Ok(tool_result(tool.name, result))
    }
}

/// Shape a dispatch outcome as a tool result
fn tool_result(tool: &str, result: DispatchResult) -> Value {
    match result {
        Ok(value) => {
            TOOL_CALLS.with_label_values(&[tool, "success"]).inc();
            json!({
                "content": [{ "type": "text", "text": value.to_string() }],
                "isError": false
            })
        }
        Err(e) => {
            TOOL_CALLS.with_label_values(&[tool, e.label()]).inc();
            warn!(tool, outcome = e.label(), error = %e, "Tool call failed");
            json!({
                "content": [{ "type": "text", "text": e.to_string() }],
                "isError": true
            })
        }
    }
}

fn error_response(id: Value, error: ApiError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error
    })
}
