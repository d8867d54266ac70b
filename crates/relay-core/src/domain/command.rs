//! Commands accepted by the dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the executor is being asked to do.
///
/// The relay never looks inside the payload; the kind only selects the
/// timeout and is forwarded to the executor verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// Run a script in the page
    Execute,
    /// Serialize (part of) the DOM
    CaptureDom,
    /// Take a screenshot of the visible tab
    CaptureScreenshot,
    /// Load a URL
    Navigate,
    /// Publish a post through the page UI
    CreatePost,
    /// Show a blocking alert to the user
    ShowAlert,
}

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::Execute,
        CommandKind::CaptureDom,
        CommandKind::CaptureScreenshot,
        CommandKind::Navigate,
        CommandKind::CreatePost,
        CommandKind::ShowAlert,
    ];

    /// Wire name, as sent to the executor
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Execute => "execute",
            CommandKind::CaptureDom => "capture-dom",
            CommandKind::CaptureScreenshot => "capture-screenshot",
            CommandKind::Navigate => "navigate",
            CommandKind::CreatePost => "create-post",
            CommandKind::ShowAlert => "show-alert",
        }
    }
}

/// Wire name that matches no [`CommandKind`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command kind: {0}")]
pub struct UnknownCommandKind(pub String);

impl FromStr for CommandKind {
    type Err = UnknownCommandKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownCommandKind(s.to_string()))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command as supplied by the tool frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub payload: serde_json::Value,
}

impl Command {
    pub fn new(kind: CommandKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }
}
