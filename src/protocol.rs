//! Wire frames exchanged with the host over the bridge channel.
//!
//! Every frame is a JSON object tagged by its `type` field:
//!
//! ```text
//! window ── {"type":"api_call","id","method","args"} ──► host
//! window ◄── {"type":"api_response","id","result"|"error"} ── host
//! window ◄── {"type":"event","message",forward_iframe} ── host
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Frames the window sends to the host
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    ApiCall {
        id: String,
        method: String,
        args: Vec<Value>,
    },
}

impl OutboundFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames pushed by the host
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    ApiResponse(ApiResponse),
    Event {
        message: Value,
        #[serde(default)]
        forward_iframe: bool,
    },
    /// Host-side complaint about a frame it could not parse
    Error {
        #[serde(default)]
        message: String,
    },
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiResponse {
    pub id: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Event type tokens shared by the dispatcher and theme code.
///
/// Unknown types are carried through as [`EventType::Other`] so opaque
/// messages still reach registered handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    TableDataChange,
    TableIndexUpdate,
    TableLaunching,
    TableLaunchComplete,
    RemoteLaunching,
    RemoteLaunchComplete,
    PlaySound,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::TableDataChange => "TableDataChange",
            EventType::TableIndexUpdate => "TableIndexUpdate",
            EventType::TableLaunching => "TableLaunching",
            EventType::TableLaunchComplete => "TableLaunchComplete",
            EventType::RemoteLaunching => "RemoteLaunching",
            EventType::RemoteLaunchComplete => "RemoteLaunchComplete",
            EventType::PlaySound => "playSound",
            EventType::Other(name) => name,
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        match name {
            "TableDataChange" => EventType::TableDataChange,
            "TableIndexUpdate" => EventType::TableIndexUpdate,
            "TableLaunching" => EventType::TableLaunching,
            "TableLaunchComplete" => EventType::TableLaunchComplete,
            "RemoteLaunching" => EventType::RemoteLaunching,
            "RemoteLaunchComplete" => EventType::RemoteLaunchComplete,
            "playSound" => EventType::PlaySound,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pushed event payload. The body stays opaque apart from its `type`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    body: Value,
}

impl EventMessage {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.body
            .get("type")
            .and_then(Value::as_str)
            .map(EventType::from)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(Value::as_str)
    }

}

impl From<Value> for EventMessage {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}
