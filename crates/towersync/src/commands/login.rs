//! `login`: check that the configured credentials are accepted.

use towersync_core::ConnectionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

use super::util;

pub async fn handle(config: &ConnectionConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let client = util::connect(config).await?;
    if !global.quiet {
        eprintln!(
            "Logged in to {} as {} ({})",
            client.endpoint(),
            client.username(),
            config.credentials.source.as_str()
        );
    }
    Ok(())
}
