//! CLI configuration: a thin wrapper around `towersync_config` shared types.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--endpoint, --username, etc.).

use std::time::Duration;

use secrecy::SecretString;

use towersync_api::LoginCredentials;
use towersync_core::{ConnectionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use towersync_config::{
    Config, Defaults, Profile, config_path, load_config, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ConnectionConfig` from the config file, profile, and flags.
pub fn build_connection_config(global: &GlobalOpts) -> Result<ConnectionConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    // If a profile exists, use it with CLI flag overrides
    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg.defaults, global);
    }

    // An explicitly requested profile must exist
    if global.profile.is_some() {
        let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
        available.sort();
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No profile found -- build from CLI flags / env vars alone
    let endpoint = global.endpoint.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = towersync_config::parse_endpoint(endpoint)?;

    let (Some(username), Some(password)) = (&global.username, &global.password) else {
        return Err(CliError::NoCredentials {
            profile: profile_name,
        });
    };
    let credentials = LoginCredentials::new(username.clone(), SecretString::from(password.clone()));

    let mut config = ConnectionConfig::new(url, credentials);
    config.tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
    config.default_resync = Duration::from_secs(cfg.defaults.resync);
    Ok(config)
}

/// Translate a `Profile` + global flags into a `ConnectionConfig`.
///
/// CLI flag overrides take priority over profile values.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    global: &GlobalOpts,
) -> Result<ConnectionConfig, CliError> {
    let mut profile = profile.clone();

    // 1. Endpoint and username (flag > env > profile)
    if let Some(ref endpoint) = global.endpoint {
        profile.endpoint.clone_from(endpoint);
    }
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }

    // 2. TLS and timeout
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    // 3. Password: profile password_env > TOWERSYNC_PASSWORD > plaintext
    Ok(towersync_config::profile_to_connection_config(
        &profile,
        profile_name,
        defaults,
    )?)
}
