//! `towersync`: list and watch Tower objects through shared informers.

mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Crates whose events `-v` turns up; everything else stays at `warn`.
const WORKSPACE_TARGETS: [&str; 4] = [
    "towersync",
    "towersync_api",
    "towersync_config",
    "towersync_core",
];

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.quiet);

    let Err(err) = run(cli).await else {
        return ExitCode::SUCCESS;
    };
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    ExitCode::from(code)
}

/// Filter used when `RUST_LOG` is unset.
fn default_directives(verbose: u8, quiet: bool) -> String {
    let level = match (verbose, quiet) {
        (0, true) => "error",
        (0, false) => "warn",
        (1, _) => "info",
        (2, _) => "debug",
        _ => return "trace".into(),
    };
    let mut directives = vec!["warn".to_owned()];
    directives.extend(WORKSPACE_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose, quiet)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(verbose >= 2),
        )
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;

    // `config` edits the file a connection would be read from.
    if let Command::Config(args) = command {
        return commands::config_cmd::handle(args, &global);
    }

    let connection = config::build_connection_config(&global)?;
    tracing::debug!(
        url = %connection.url,
        username = %connection.credentials.username,
        "resolved connection"
    );
    commands::dispatch(command, connection, &global).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_lowers_workspace_crates_to_error() {
        assert_eq!(
            default_directives(0, true),
            "warn,towersync=error,towersync_api=error,towersync_config=error,towersync_core=error"
        );
    }

    #[test]
    fn verbosity_raises_only_workspace_crates() {
        let info = default_directives(1, false);
        assert!(info.starts_with("warn,"));
        assert!(info.contains("towersync_core=info"));

        // -v beats -q.
        assert_eq!(default_directives(2, true), default_directives(2, false));
        assert!(default_directives(2, false).contains("towersync_api=debug"));
    }

    #[test]
    fn very_verbose_traces_everything() {
        assert_eq!(default_directives(3, false), "trace");
        assert_eq!(default_directives(9, true), "trace");
    }
}
