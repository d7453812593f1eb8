// ── Runtime connection configuration ──
//
// These types describe *how* to reach a Tower endpoint and how the
// informers should behave. They carry credential data and tuning, but
// never touch disk. The CLI builds a `ConnectionConfig` and hands it in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use towersync_api::{LoginCredentials, TlsMode, TowerClient, TransportConfig};
use tracing::debug;
use url::Url;

use crate::error::CoreError;
use crate::model::ObjectKind;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for talking to a single Tower endpoint.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// GraphQL endpoint (e.g., `https://tower.example.com/v2/api`).
    pub url: Url,
    pub credentials: LoginCredentials,
    pub tls: TlsVerification,
    /// Timeout for query-channel requests.
    pub timeout: Duration,
    /// Resync period for kinds without an override. Zero disables resync.
    pub default_resync: Duration,
    pub custom_resync: HashMap<ObjectKind, Duration>,
}

impl ConnectionConfig {
    pub fn new(url: Url, credentials: LoginCredentials) -> Self {
        Self {
            url,
            credentials,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            default_resync: Duration::ZERO,
            custom_resync: HashMap::new(),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        }
    }

    /// Build a client for this endpoint without logging in.
    pub fn client(&self) -> Result<TowerClient, CoreError> {
        Ok(TowerClient::new(
            self.url.clone(),
            self.credentials.clone(),
            &self.transport(),
        )?)
    }

    /// Build a client and log in.
    pub async fn connect(&self) -> Result<TowerClient, CoreError> {
        let client = self.client()?;
        debug!(url = %self.url, "connecting");
        client
            .auth()
            .await
            .map_err(|e| CoreError::from_api(e, &self.url))?;
        Ok(client)
    }
}
