// ── Core error types ──
//
// User-facing errors from towersync-core. Consumers never see reqwest or
// tungstenite errors directly; the `From<towersync_api::Error>` impl
// folds transport-layer failures into the categories below.

use thiserror::Error;
use towersync_api::{Response, WEBSOCKET_CONNECT_ERROR};
use url::Url;

use crate::model::ObjectKind;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to Tower at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Subscription / response errors ───────────────────────────────
    /// The push channel broke: malformed frame, unexpected message kind,
    /// or the connection dropped.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// The server answered with errors of its own.
    #[error("Tower returned an error: {message}")]
    Application {
        message: String,
        code: Option<String>,
    },

    // ── Sync errors ──────────────────────────────────────────────────
    #[error("Cache for {} did not sync before the stop signal", join_kinds(kinds))]
    SyncTimeout { kinds: Vec<ObjectKind> },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stand-in address for connection failures that did not record one.
const UNKNOWN_URL: &str = "<unknown>";

fn join_kinds(kinds: &[ObjectKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl CoreError {
    /// Classify a response that carries errors.
    ///
    /// Errors synthesized by the subscription pump carry the
    /// `WebsocketConnectError` code and become `Protocol`; anything else
    /// came from the server and becomes `Application`.
    pub fn from_response(resp: &Response) -> Self {
        let message = resp.error_summary();
        let code = resp.errors.first().and_then(|e| e.code.clone());
        if code.as_deref() == Some(WEBSOCKET_CONNECT_ERROR) {
            CoreError::Protocol { message }
        } else {
            CoreError::Application { message, code }
        }
    }

    /// Convert an API error raised while talking to `endpoint`.
    ///
    /// TLS and WebSocket failures carry no address of their own; they are
    /// reported against `endpoint`.
    pub fn from_api(err: towersync_api::Error, endpoint: &Url) -> Self {
        match Self::from(err) {
            CoreError::ConnectionFailed { url, reason } if url == UNKNOWN_URL => {
                CoreError::ConnectionFailed {
                    url: endpoint.to_string(),
                    reason,
                }
            }
            other => other,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<towersync_api::Error> for CoreError {
    fn from(err: towersync_api::Error) -> Self {
        use towersync_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Transport(ref e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| UNKNOWN_URL.into(), ToString::to_string),
                reason: e.to_string(),
            },
            Api::Decode { status, message } => CoreError::Protocol {
                message: format!("undecodable response (HTTP {status}): {message}"),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("Unsupported URL scheme: {scheme}"),
            },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: UNKNOWN_URL.into(),
                reason: format!("TLS error: {msg}"),
            },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: UNKNOWN_URL.into(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            Api::WebSocketSend(reason) => CoreError::ConnectionFailed {
                url: UNKNOWN_URL.into(),
                reason: format!("WebSocket send failed: {reason}"),
            },
            Api::Serialization(e) => CoreError::Internal(format!("Serialization error: {e}")),
        }
    }
}
