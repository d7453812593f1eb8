use thiserror::Error;

/// Top-level error type for the `towersync-api` crate.
///
/// Covers every failure mode that surfaces synchronously from the client:
/// transport, authentication, and request encoding. Failures that happen
/// after a subscription is open never show up here; they are delivered as
/// terminal [`Response`](crate::Response)s on the subscription queue.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected, or the token could not be recovered from the reply.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The query channel answered with a body that is not a GraphQL response.
    #[error("Undecodable response (HTTP {status}): {message}")]
    Decode { status: u16, message: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The endpoint URL scheme could not be mapped onto a transport.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection (handshake) failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The initial start message could not be written.
    #[error("WebSocket write failed: {0}")]
    WebSocketSend(String),

    // ── Data ────────────────────────────────────────────────────────
    /// A request could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` for failures to reach or write to the remote endpoint.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Decode { .. }
                | Self::InvalidUrl(_)
                | Self::UnsupportedScheme(_)
                | Self::Tls(_)
                | Self::WebSocketConnect(_)
                | Self::WebSocketSend(_)
        )
    }

    /// Returns `true` if this error indicates the login was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }
}
