//! Tool catalog exposed on the frontend.
//!
//! Each tool maps onto one command kind. Arguments are checked for shape
//! here and then forwarded to the executor as the command payload.

use crate::error::{ApiError, ApiResult};
use relay_core::{Command, CommandKind};
use serde_json::{json, Map, Value};

/// One string argument a tool accepts
#[derive(Debug, Clone, Copy)]
pub struct ToolArg {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Static description of a tool
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub kind: CommandKind,
    pub description: &'static str,
    pub args: &'static [ToolArg],
}

pub const TOOLS: [ToolSpec; 6] = [
    ToolSpec {
        name: "browser-execute",
        kind: CommandKind::Execute,
        description: "Execute JavaScript in the active browser tab and return its result",
        args: &[ToolArg {
            name: "code",
            description: "JavaScript source to evaluate",
            required: true,
        }],
    },
    ToolSpec {
        name: "browser-capture-dom",
        kind: CommandKind::CaptureDom,
        description: "Capture the HTML of the page or of the first element matching a selector",
        args: &[ToolArg {
            name: "selector",
            description: "CSS selector; the whole document when omitted",
            required: false,
        }],
    },
    ToolSpec {
        name: "browser-capture-screenshot",
        kind: CommandKind::CaptureScreenshot,
        description: "Capture a screenshot of the visible part of the active tab",
        args: &[],
    },
    ToolSpec {
        name: "browser-navigate",
        kind: CommandKind::Navigate,
        description: "Navigate the active tab to a URL",
        args: &[ToolArg {
            name: "url",
            description: "Absolute URL to load",
            required: true,
        }],
    },
    ToolSpec {
        name: "create-post",
        kind: CommandKind::CreatePost,
        description: "Create a post with the given content through the page UI",
        args: &[ToolArg {
            name: "content",
            description: "Text of the post",
            required: true,
        }],
    },
    ToolSpec {
        name: "browser-show-alert",
        kind: CommandKind::ShowAlert,
        description: "Show an alert dialog in the active tab",
        args: &[ToolArg {
            name: "message",
            description: "Text to display",
            required: true,
        }],
    },
];

pub fn find(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|tool| tool.name == name)
}

impl ToolSpec {
    /// JSON schema of the tool's arguments
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .args
            .iter()
            .map(|arg| {
                (
                    arg.name.to_string(),
                    json!({"type": "string", "description": arg.description}),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .args
            .iter()
            .filter(|arg| arg.required)
            .map(|arg| arg.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Entry for `tools/list`
    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// Check arguments and build the command for the executor.
    pub fn command(&self, arguments: Option<&Value>) -> ApiResult<Command> {
        let arguments = match arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ApiError::invalid_params(format!(
                    "{}: arguments must be an object",
                    self.name
                )))
            }
        };

        for arg in self.args {
            match arguments.get(arg.name) {
                Some(Value::String(_)) => {}
                None | Some(Value::Null) if !arg.required => {}
                None | Some(Value::Null) => {
                    return Err(ApiError::invalid_params(format!(
                        "{}: missing required argument '{}'",
                        self.name, arg.name
                    )))
                }
                Some(_) => {
                    return Err(ApiError::invalid_params(format!(
                        "{}: argument '{}' must be a string",
                        self.name, arg.name
                    )))
                }
            }
        }

        Ok(Command::new(self.kind, Value::Object(arguments)))
    }
}

/// `tools/list` result
pub fn list() -> Value {
    json!({ "tools": TOOLS.iter().map(ToolSpec::describe).collect::<Vec<_>>() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    #[test]
    fn test_every_kind_has_one_tool() {
        for kind in CommandKind::ALL {
            assert_eq!(TOOLS.iter().filter(|t| t.kind == kind).count(), 1, "{}", kind);
        }
    }

    #[test]
    fn test_schema_lists_required_arguments() {
        let navigate = find("browser-navigate").unwrap().input_schema();
        assert_eq!(navigate["required"], json!(["url"]));
        assert_eq!(navigate["properties"]["url"]["type"], "string");

        let dom = find("browser-capture-dom").unwrap().input_schema();
        assert_eq!(dom["required"], json!([]));
        assert!(dom["properties"].get("selector").is_some());
    }

    #[test]
    fn test_command_forwards_arguments() {
        let command = find("create-post")
            .unwrap()
            .command(Some(&json!({"content": "hello"})))
            .unwrap();
        assert_eq!(command.kind, CommandKind::CreatePost);
        assert_eq!(command.payload, json!({"content": "hello"}));
    }

    #[test]
    fn test_optional_and_missing_arguments() {
        let dom = find("browser-capture-dom").unwrap();
        assert!(dom.command(None).is_ok());
        assert!(dom.command(Some(&json!({"selector": "main"}))).is_ok());

        let screenshot = find("browser-capture-screenshot").unwrap();
        assert_eq!(screenshot.command(None).unwrap().payload, json!({}));

        let err = find("browser-execute").unwrap().command(Some(&json!({}))).unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert!(err.message.contains("code"));
    }

    #[test]
    fn test_wrong_argument_types_rejected() {
        let navigate = find("browser-navigate").unwrap();
        assert!(navigate.command(Some(&json!({"url": 42}))).is_err());
        assert!(navigate.command(Some(&json!(["https://x"]))).is_err());
    }
}
