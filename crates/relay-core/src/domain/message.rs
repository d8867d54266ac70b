//! Wire frames exchanged with executors.
//!
//! Every frame is a JSON object discriminated by its `type` field.
//!
//! ```text
//! relay → executor   {"type":"command","id":"…","kind":"navigate","payload":{…}}
//! executor → relay   {"type":"command_result","id":"…","result":…}
//!                    {"type":"command_error","id":"…","error":"…"}
//!                    {"type":"status"} | {"type":"ping"}
//! relay → executor   {"type":"status","connectedExecutors":1,"pendingRequests":0}
//!                    {"type":"pong"}
//! ```

use crate::domain::command::CommandKind;
use crate::domain::correlation::RequestId;
use crate::domain::error::InboundError;
use serde::{Deserialize, Serialize};

/// Frames the relay writes to executors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Command {
        id: RequestId,
        kind: CommandKind,
        payload: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    Status {
        connected_executors: usize,
        pending_requests: usize,
    },
    Pong,
}

impl OutboundFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames executors send to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    CommandResult {
        id: RequestId,
        #[serde(default)]
        result: serde_json::Value,
    },
    CommandError {
        id: RequestId,
        error: serde_json::Value,
    },
    Status,
    Ping,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, InboundError> {
        serde_json::from_str(text).map_err(|e| InboundError::Malformed(e.to_string()))
    }
}

/// Flatten whatever the executor put in `error` into a message.
///
/// Executors send either a bare string or an object with a `message` field.
pub fn error_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => match map.get("message") {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => error.to_string(),
        },
        serde_json::Value::Null => "executor reported an error".to_string(),
        other => other.to_string(),
    }
}
