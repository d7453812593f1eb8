// Tower GraphQL client
//
// Owns one endpoint identity (URL + login credentials + session token)
// and exposes the two channels Tower speaks: one-shot queries over HTTP
// and graphql-ws subscriptions over a WebSocket. The session token is
// written once by `auth()` and attached to every request afterwards.

use std::sync::RwLock;

use futures_util::SinkExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tracing::{debug, info, trace};
use url::Url;
use uuid::Uuid;

use crate::auth::{LOGIN_MUTATION, LoginCredentials, TOKEN_PATH};
use crate::error::Error;
use crate::message::{MEDIA_TYPE, Message, Request, Response, SUBSCRIPTION_PROTOCOL};
use crate::subscription::Subscription;
use crate::transport::TransportConfig;

/// Which of Tower's two transports a request travels over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// One-shot HTTP request/response.
    Query,
    /// Persistent WebSocket subscription.
    Push,
}

/// Rewrite `url`'s scheme for `channel`, preserving transport security.
///
/// `https`/`wss` map to the secure variants (`https` for queries, `wss`
/// for pushes); every other scheme maps to the insecure ones.
pub fn select_scheme(url: &Url, channel: Channel) -> Result<Url, Error> {
    let secure = matches!(url.scheme(), "https" | "wss");
    let scheme = match (channel, secure) {
        (Channel::Query, false) => "http",
        (Channel::Query, true) => "https",
        (Channel::Push, false) => "ws",
        (Channel::Push, true) => "wss",
    };

    let mut selected = url.clone();
    selected
        .set_scheme(scheme)
        .map_err(|()| Error::UnsupportedScheme(url.scheme().to_owned()))?;
    Ok(selected)
}

/// Async client for a Tower endpoint.
///
/// Handles header construction, scheme selection, login, and the
/// subscription handshake. Cheap to share behind an `Arc`; every method
/// takes `&self`.
pub struct TowerClient {
    http: reqwest::Client,
    endpoint: Url,
    credentials: LoginCredentials,
    transport: TransportConfig,
    /// Session token returned by the login mutation. Sent verbatim as the
    /// `Authorization` header on both channels.
    token: RwLock<Option<SecretString>>,
}

impl TowerClient {
    /// Create a client from a `TransportConfig`. Does not contact the
    /// server; call [`auth`](Self::auth) before issuing other requests.
    pub fn new(
        endpoint: Url,
        credentials: LoginCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, endpoint, credentials, transport.clone()))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        endpoint: Url,
        credentials: LoginCredentials,
        transport: TransportConfig,
    ) -> Self {
        Self {
            http,
            endpoint,
            credentials,
            transport,
            token: RwLock::new(None),
        }
    }

    /// The endpoint URL as configured (before scheme selection).
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Whether a session token has been stored.
    pub fn is_authenticated(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    // ── Headers ──────────────────────────────────────────────────────

    fn store_token(&self, token: String) {
        debug!("storing session token");
        *self.token.write().expect("token lock poisoned") = Some(SecretString::from(token));
    }

    /// Headers shared by both channels.
    fn header_pairs(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", MEDIA_TYPE.to_owned()),
            ("Accept", MEDIA_TYPE.to_owned()),
        ];
        let guard = self.token.read().expect("token lock poisoned");
        if let Some(token) = guard.as_ref() {
            headers.push(("Authorization", token.expose_secret().to_owned()));
        }
        headers
    }

    // ── Query channel ────────────────────────────────────────────────

    /// Send a one-shot GraphQL request.
    ///
    /// The body is decoded as a [`Response`] whatever the HTTP status, so
    /// application errors come back inside `Ok(resp.errors)`. Only a
    /// failed send or an undecodable body is an `Err`.
    pub async fn query(&self, request: &Request) -> Result<Response, Error> {
        let url = select_scheme(&self.endpoint, Channel::Query)?;
        let body = serde_json::to_vec(request)?;

        debug!("POST {}", url);

        let mut builder = self.http.post(url);
        for (name, value) in self.header_pairs() {
            builder = builder.header(name, value);
        }
        let resp = builder.body(body).send().await.map_err(Error::Transport)?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(Error::Transport)?;
        trace!(%status, len = bytes.len(), "query response received");

        serde_json::from_slice(&bytes).map_err(|e| {
            let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(200)]).into_owned();
            Error::Decode {
                status: status.as_u16(),
                message: format!("{e} (body preview: {preview:?})"),
            }
        })
    }

    /// Log in and store the session token.
    ///
    /// Sends the login mutation with this client's credentials and reads
    /// the token from `data.login.token`.
    pub async fn auth(&self) -> Result<(), Error> {
        let request =
            Request::new(LOGIN_MUTATION).with_variable("data", self.credentials.login_input());

        debug!(username = %self.credentials.username, "logging in");

        let resp = self.query(&request).await.map_err(|e| Error::Authentication {
            message: format!("failed to login: {e}"),
        })?;

        if !resp.is_ok() {
            return Err(Error::Authentication {
                message: format!("login rejected: {}", resp.error_summary()),
            });
        }

        let token = resp
            .lookup(&TOKEN_PATH)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: format!(
                    "no token at data.{} in login response",
                    TOKEN_PATH.join(".")
                ),
            })?;

        self.store_token(token.to_owned());
        info!(username = %self.credentials.username, "login successful");
        Ok(())
    }

    // ── Push channel ─────────────────────────────────────────────────

    /// Open a subscription for `request`.
    ///
    /// Connects, writes a single `start` message tagged with a fresh id,
    /// then hands the socket to a pump task. If the start message cannot
    /// be written the socket is closed before returning.
    pub async fn subscription(&self, request: &Request) -> Result<Subscription, Error> {
        let id = Uuid::new_v4().to_string();
        let start = serde_json::to_string(&Message::start(id.clone(), request)?)?;

        let url = select_scheme(&self.endpoint, Channel::Push)?;
        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let mut handshake = ClientRequestBuilder::new(uri).with_sub_protocol(SUBSCRIPTION_PROTOCOL);
        for (name, value) in self.header_pairs() {
            handshake = handshake.with_header(name, value);
        }

        debug!(url = %url, subscription_id = %id, "opening subscription");

        let connector = self.transport.websocket_connector()?;
        let (mut ws, _response) =
            tokio_tungstenite::connect_async_tls_with_config(handshake, None, false, connector)
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        if let Err(e) = ws.send(tungstenite::Message::text(start)).await {
            let _ = ws.close(None).await;
            return Err(Error::WebSocketSend(e.to_string()));
        }

        info!(subscription_id = %id, "subscription started");
        Ok(Subscription::spawn(id, ws))
    }
}
