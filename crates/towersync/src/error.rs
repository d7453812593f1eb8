//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use towersync_config::ConfigError;
use towersync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: u8 = 1;
    pub const USAGE: u8 = 2;
    pub const AUTH: u8 = 3;
    pub const PROTOCOL: u8 = 4;
    pub const CONNECTION: u8 = 7;
    pub const TIMEOUT: u8 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to Tower at {url}")]
    #[diagnostic(
        code(towersync::connection_failed),
        help(
            "Check that the endpoint is reachable and serves the GraphQL API.\n\
             URL: {url}\n\
             For self-signed certificates, try --insecure (-k) or set ca_cert in your profile."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(towersync::auth_failed),
        help(
            "Verify the username, password, and user source (local or ldap).\n\
             The password is read from TOWERSYNC_PASSWORD or the profile's password_env."
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(towersync::no_credentials),
        help(
            "Set a username in the profile or pass --username,\n\
             and export TOWERSYNC_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Server responses ─────────────────────────────────────────────
    #[error("Subscription or response could not be processed: {message}")]
    #[diagnostic(code(towersync::protocol))]
    Protocol { message: String },

    #[error("Tower returned an error ({code}): {message}")]
    #[diagnostic(code(towersync::application))]
    Application { code: String, message: String },

    // ── Sync ─────────────────────────────────────────────────────────
    #[error("Cache for {kinds} did not sync within {seconds}s")]
    #[diagnostic(
        code(towersync::sync_timeout),
        help("Increase the wait with --sync-timeout, or rerun with -v to see the reflector's error.")
    )]
    SyncTimeout { kinds: String, seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(towersync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(towersync::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No endpoint configured")]
    #[diagnostic(
        code(towersync::no_config),
        help(
            "Pass --endpoint, set TOWERSYNC_ENDPOINT, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(towersync::config))]
    Config(Box<figment::Error>),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(towersync::config))]
    ConfigFile(String),

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(towersync::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(towersync::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Protocol { .. } | Self::Application { .. } => exit_code::PROTOCOL,
            Self::SyncTimeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Protocol { message } => CliError::Protocol { message },
            CoreError::Application { message, code } => CliError::Application {
                code: code.unwrap_or_else(|| "unknown".into()),
                message,
            },
            CoreError::SyncTimeout { kinds } => CliError::SyncTimeout {
                kinds: kinds
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                seconds: 0,
            },
            CoreError::Config { message } => CliError::ConfigFile(message),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
            ConfigError::Serialization(e) => CliError::ConfigFile(e.to_string()),
        }
    }
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}
