//! Clap derive structures for the `towersync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

use towersync_core::ObjectKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// towersync -- query and watch a Tower endpoint from the command line
#[derive(Debug, Parser)]
#[command(
    name = "towersync",
    version,
    about = "Query and watch Tower objects from the command line",
    long_about = "Talks to a Tower GraphQL endpoint over its query and push channels.\n\n\
        `list` and `watch` run shared informers: each kind is listed once,\n\
        then kept current from a graphql-ws subscription.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Profile to use
    #[arg(long, short = 'p', env = "TOWERSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// GraphQL endpoint URL (overrides profile)
    #[arg(long, short = 'e', env = "TOWERSYNC_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Login username (overrides profile)
    #[arg(long, short = 'u', env = "TOWERSYNC_USERNAME", global = true)]
    pub username: Option<String>,

    /// Login password. Read from the environment only.
    #[arg(long, env = "TOWERSYNC_PASSWORD", global = true, hide = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TOWERSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "TOWERSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "TOWERSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one key per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and report whether the credentials were accepted
    Login,

    /// Run a raw GraphQL query
    #[command(alias = "q")]
    Query(QueryArgs),

    /// Sync a kind into a local cache and print it
    #[command(alias = "ls")]
    List(ListArgs),

    /// Sync kinds and stream their changes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  QUERY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// GraphQL document, e.g. '{ vms { id name } }'
    pub query: String,

    /// Variables as a JSON object
    #[arg(long, short = 'V')]
    pub variables: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LIST / WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Object kind (vm, label)
    pub kind: ObjectKind,

    /// Seconds to wait for the initial sync
    #[arg(long = "sync-timeout", short = 't', default_value = "30")]
    pub sync_timeout: u64,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Object kinds to watch (vm, label)
    #[arg(required = true, num_args = 1..)]
    pub kinds: Vec<ObjectKind>,

    /// Seconds to wait for the initial sync
    #[arg(long = "sync-timeout", short = 't', default_value = "30")]
    pub sync_timeout: u64,

    /// Periodic resync in seconds (overrides profile, 0 disables)
    #[arg(long)]
    pub resync: Option<u64>,

    /// Also print the initial list as `added` events
    #[arg(long)]
    pub initial: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}
