//! Command handlers, one module per subcommand.

pub mod config_cmd;
pub mod list;
pub mod login;
pub mod query;
pub mod util;
pub mod watch;

use towersync_core::ConnectionConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a parsed command to its handler. `config` is handled in
/// `main` since it never needs a connection.
pub async fn dispatch(
    cmd: Command,
    config: ConnectionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Login => login::handle(&config, global).await,
        Command::Query(args) => query::handle(&config, args, global).await,
        Command::List(args) => list::handle(&config, args, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Config(_) => unreachable!(),
    }
}
