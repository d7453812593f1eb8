// Wire types shared by the query and subscription channels.
//
// The query channel carries `Request`/`Response` bodies directly; the
// push channel wraps them in a `Message` envelope whose `id` ties every
// server message back to the client's `start`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Media type used for every request and response body.
pub const MEDIA_TYPE: &str = "application/json";

/// Sub-protocol advertised on the push-channel handshake.
pub const SUBSCRIPTION_PROTOCOL: &str = "graphql-ws";

/// Error code attached to responses synthesized by the subscription pump.
pub const WEBSOCKET_CONNECT_ERROR: &str = "WebsocketConnectError";

// ── Request ──────────────────────────────────────────────────────────

/// A GraphQL operation: query text plus its variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub query: String,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: HashMap::new(),
        }
    }

    /// Add a variable, replacing any previous value under the same name.
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

// ── Response ─────────────────────────────────────────────────────────

/// A single entry of a response's `errors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// A decoded GraphQL response. An empty `errors` list means success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Value,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<ResponseError>,
}

impl Response {
    /// Build a terminal response describing a subscription-level failure.
    pub fn connect_error(message: impl Into<String>) -> Self {
        Self {
            data: Value::Null,
            errors: vec![ResponseError {
                message: message.into(),
                code: Some(WEBSOCKET_CONNECT_ERROR.to_owned()),
            }],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Walk `data` along `path`, returning the nested value if every
    /// segment exists.
    pub fn lookup(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.data, |value, segment| value.get(segment))
    }

    /// Render the error list as a single `; `-joined line.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ResponseError>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ResponseError>>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Envelope ─────────────────────────────────────────────────────────

/// Kind of a push-channel envelope.
///
/// Anything the server sends outside the four known kinds is kept
/// verbatim in [`Other`](Self::Other) so diagnostics can name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    Start,
    Data,
    Error,
    Complete,
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Data => "data",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::Other(kind) => kind,
        }
    }
}

impl From<String> for MessageKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "start" => Self::Start,
            "data" => Self::Data,
            "error" => Self::Error,
            "complete" => Self::Complete,
            _ => Self::Other(kind),
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One push-channel frame: `{"id": .., "type": .., "payload": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    /// Build the `start` envelope that opens a subscription.
    pub fn start(id: impl Into<String>, request: &Request) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: id.into(),
            kind: MessageKind::Start,
            payload: serde_json::to_value(request)?,
        })
    }

    /// Payload rendered as text: string payloads unquoted, anything else
    /// as compact JSON.
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}
