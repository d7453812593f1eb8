//! Push-channel subscriptions.
//!
//! A [`Subscription`] owns the receive side of a bounded queue fed by a
//! background pump task. The pump reads one frame at a time off the
//! WebSocket, decodes it into a [`Response`], and publishes it until a
//! terminal condition: a response carrying errors (including ones the pump
//! synthesizes for protocol failures), the peer closing, or the caller
//! stopping the subscription.
//!
//! Whatever the trigger, the queue is closed exactly once (the pump owns
//! the only sender) and the connection is closed exactly once (after the
//! read loop exits).
//!
//! # Example
//!
//! ```rust,ignore
//! let mut sub = client.subscription(&Request::new("subscription { vm { mutation } }")).await?;
//! while let Some(resp) = sub.recv().await {
//!     if !resp.is_ok() {
//!         eprintln!("subscription ended: {}", resp.error_summary());
//!         break;
//!     }
//!     println!("{}", resp.data);
//! }
//! sub.stop();
//! ```

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message as Frame};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::message::{Message, MessageKind, Response};

// ── Queue sizing ─────────────────────────────────────────────────────

/// Capacity of the delivery queue between the pump and its consumer.
pub const RESPONSE_QUEUE_CAPACITY: usize = 10;

/// Upper bound on how long the pump waits for the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ── StopHandle ───────────────────────────────────────────────────────

/// Idempotent stop signal shared between a subscription and its pump.
///
/// Stopping more than once is a no-op, and stopping after the pump has
/// already terminated on its own is harmless.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the stop signal. Safe to call any number of times.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the stop signal has been raised.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// An open subscription: a queue of responses plus its stop handle.
///
/// Dropping the subscription stops it.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    responses: mpsc::Receiver<Response>,
    stop: StopHandle,
}

impl Subscription {
    /// Assemble a subscription from an existing queue and stop handle.
    ///
    /// Used by alternative list/watch sources that produce responses
    /// without a WebSocket behind them.
    pub fn new(id: impl Into<String>, responses: mpsc::Receiver<Response>, stop: StopHandle) -> Self {
        Self {
            id: id.into(),
            responses,
            stop,
        }
    }

    /// Spawn the pump over an already-started WebSocket.
    pub(crate) fn spawn<S>(id: String, ws: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(RESPONSE_QUEUE_CAPACITY);
        let stop = StopHandle::new();

        let task_stop = stop.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            let (mut write, mut read) = ws.split();
            pump(&mut read, tx, &task_stop, &task_id).await;

            match tokio::time::timeout(CLOSE_TIMEOUT, write.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(subscription_id = %task_id, error = %e, "close handshake failed"),
                Err(_) => debug!(subscription_id = %task_id, "close handshake timed out"),
            }
            debug!(subscription_id = %task_id, "subscription connection released");
        });

        Self {
            id,
            responses: rx,
            stop,
        }
    }

    /// Correlation id sent with the `start` message.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next response. `None` once the queue is closed.
    pub async fn recv(&mut self) -> Option<Response> {
        self.responses.recv().await
    }

    /// A clone of this subscription's stop handle.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop the subscription. Idempotent.
    pub fn stop(&self) {
        self.stop.stop();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

// ── Pump ─────────────────────────────────────────────────────────────

/// Read frames until a terminal condition, publishing each decoded
/// response. Consumes the only sender, so the queue closes on return.
pub(crate) async fn pump<S>(
    read: &mut S,
    tx: mpsc::Sender<Response>,
    stop: &StopHandle,
    subscription_id: &str,
) where
    S: Stream<Item = Result<Frame, tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            () = stop.stopped() => break,
            frame = read.next() => frame,
        };

        let Some(response) = classify(frame, subscription_id) else {
            continue;
        };
        let terminal = !response.is_ok();

        if !publish(&tx, stop, response).await {
            break;
        }
        if terminal {
            warn!(subscription_id, "subscription terminated by error response");
            stop.stop();
            break;
        }
    }
    debug!(subscription_id, "subscription pump finished");
}

/// Send one response, giving up if the stop signal fires first or the
/// consumer has gone away.
async fn publish(tx: &mpsc::Sender<Response>, stop: &StopHandle, response: Response) -> bool {
    tokio::select! {
        biased;
        () = stop.stopped() => false,
        sent = tx.send(response) => sent.is_ok(),
    }
}

/// Map one read result onto the response to publish, or `None` for
/// control frames that carry nothing.
fn classify(
    frame: Option<Result<Frame, tungstenite::Error>>,
    subscription_id: &str,
) -> Option<Response> {
    match frame {
        None => Some(Response::connect_error("connection closed without close frame")),
        Some(Err(e)) => Some(Response::connect_error(format!(
            "error reading response message: {e}"
        ))),
        Some(Ok(Frame::Text(text))) => Some(decode_frame(text.as_bytes(), subscription_id)),
        Some(Ok(Frame::Binary(bytes))) => Some(decode_frame(&bytes, subscription_id)),
        Some(Ok(Frame::Close(frame))) => {
            let reason = frame.map_or_else(
                || "no close frame payload".to_owned(),
                |cf| format!("code {}: {}", cf.code, cf.reason),
            );
            Some(Response::connect_error(format!(
                "connection closed by server ({reason})"
            )))
        }
        Some(Ok(_)) => {
            // Ping / Pong / raw frames; tungstenite answers pings itself.
            trace!(subscription_id, "control frame");
            None
        }
    }
}

/// Decode one envelope into the response to publish.
fn decode_frame(bytes: &[u8], subscription_id: &str) -> Response {
    let msg: Message = match serde_json::from_slice(bytes) {
        Ok(msg) => msg,
        Err(e) => return Response::connect_error(format!("error decoding response message: {e}")),
    };

    if !msg.id.is_empty() && msg.id != subscription_id {
        return Response::connect_error(format!(
            "message for unknown subscription {}, expected {subscription_id}",
            msg.id
        ));
    }

    match msg.kind {
        MessageKind::Data => serde_json::from_value(msg.payload).unwrap_or_else(|e| {
            Response::connect_error(format!("error decoding data payload: {e}"))
        }),
        MessageKind::Error => Response::connect_error(msg.payload_text()),
        MessageKind::Complete => Response::connect_error(format!(
            "unexpected complete message, payload: {}",
            msg.payload_text()
        )),
        MessageKind::Start | MessageKind::Other(_) => Response::connect_error(format!(
            "unknown message type {}, payload: {}",
            msg.kind,
            msg.payload_text()
        )),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
