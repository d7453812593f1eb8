//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::Printer;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "resync = {}", cfg.defaults.resync);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "endpoint = \"{}\"", p.endpoint);
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref source) = p.source {
            let _ = writeln!(out, "source = \"{source}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(resync) = p.resync {
            let _ = writeln!(out, "resync = {resync}");
        }
        if !p.kind_resync.is_empty() {
            let mut kinds: Vec<_> = p.kind_resync.iter().collect();
            kinds.sort();
            let _ = writeln!(out);
            let _ = writeln!(out, "[profiles.{name}.kind_resync]");
            for (kind, secs) in kinds {
                let _ = writeln!(out, "{kind} = {secs}");
            }
        }
    }

    out
}

#[derive(Serialize)]
struct ProfileEntry {
    name: String,
    endpoint: String,
    username: Option<String>,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Username")]
    username: String,
}

impl From<&ProfileEntry> for ProfileRow {
    fn from(e: &ProfileEntry) -> Self {
        Self {
            marker: if e.default { "*" } else { "" },
            name: e.name.clone(),
            endpoint: e.endpoint.clone(),
            username: e.username.clone().unwrap_or_default(),
        }
    }
}

fn profile_entries(cfg: &Config) -> Vec<ProfileEntry> {
    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let p = &cfg.profiles[name];
            ProfileEntry {
                name: name.clone(),
                endpoint: p.endpoint.clone(),
                username: p.username.clone(),
                default: cfg.default_profile.as_deref() == Some(name.as_str()),
            }
        })
        .collect()
}

fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            print!("{}", format_config_redacted(&cfg));
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let entries = profile_entries(&cfg);
            if entries.is_empty() {
                if !global.quiet {
                    eprintln!(
                        "No profiles configured in {}",
                        config::config_path().display()
                    );
                }
                return Ok(());
            }
            Printer::stdout(global).listing(
                &entries,
                |e| ProfileRow::from(e),
                |e| e.name.as_str(),
            )?;
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}
