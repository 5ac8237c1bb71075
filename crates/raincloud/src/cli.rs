//! Clap derive structures for the `raincloud` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace types so `build.rs` can include it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// raincloud -- watch and control Melnor RainCloud irrigation timers
#[derive(Debug, Parser)]
#[command(
    name = "raincloud",
    version,
    about = "Watch and control RainCloud irrigation accounts from the command line",
    long_about = "Polls a RainCloud account on a fixed cadence, exposes every controller,\n\
        faucet and zone attribute as an entity, and forwards switch and\n\
        rain-delay commands to the account.",
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
    /// Configured account to use (username or unique id)
    #[arg(long, short = 'a', env = "RAINCLOUD_ACCOUNT", global = true)]
    pub account: Option<String>,

    /// Account username (bypasses the config file)
    #[arg(long, short = 'u', env = "RAINCLOUD_USERNAME", global = true)]
    pub username: Option<String>,

    /// Simulated-account JSON fixture serving the account
    #[arg(long, env = "RAINCLOUD_FIXTURE", global = true)]
    pub fixture: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RAINCLOUD_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Poll cadence, e.g. "10s" or "1m" (overrides the account)
    #[arg(long, global = true)]
    pub poll_interval: Option<String>,

    /// Manual watering length in minutes (5, 10, 15, 30, 45 or 60)
    #[arg(long, global = true)]
    pub watering_minutes: Option<u32>,
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
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
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

/// Entity platform filter.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PlatformArg {
    BinarySensor,
    Sensor,
    Switch,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Refresh once and print every entity
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Keep polling and print each refresh
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Turn a switch entity on or off
    #[command(alias = "sw")]
    Switch(SwitchArgs),

    /// Set a rain delay on every zone of the account
    RainDelay(RainDelayArgs),

    /// Manage configured accounts
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  STATUS / WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only show entities of this platform
    #[arg(long, short = 'p')]
    pub platform: Option<PlatformArg>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many refreshes (default: until interrupted)
    #[arg(long, short = 'n')]
    pub polls: Option<u64>,

    /// Only show entities of this platform
    #[arg(long, short = 'p')]
    pub platform: Option<PlatformArg>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMMANDS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SwitchArgs {
    #[command(subcommand)]
    pub command: SwitchCommand,
}

#[derive(Debug, Subcommand)]
pub enum SwitchCommand {
    /// Turn a switch on (manual watering uses the configured length)
    On {
        /// Switch entity id, e.g. F1_auto_watering_1
        entity: String,
    },

    /// Turn a switch off
    Off {
        /// Switch entity id, e.g. F1_manual_watering_1
        entity: String,
    },
}

#[derive(Debug, Args)]
pub struct RainDelayArgs {
    /// Days to suspend scheduled watering (0 clears the delay)
    pub days: u32,
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
    /// Add an account with guided setup
    Init {
        /// Where to keep the password (prompts when omitted)
        #[arg(long)]
        store: Option<SecretStore>,
    },

    /// Display the configuration with secrets masked
    Show,

    /// Print the config file path
    Path,

    /// Replace the stored password of an account
    Reauth {
        /// Where to keep the password (prompts when omitted)
        #[arg(long)]
        store: Option<SecretStore>,
    },

    /// Remove an account and its stored password
    Remove,
}

/// Password storage backends.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SecretStore {
    /// System keyring (recommended)
    Keyring,
    /// Plaintext in the config file
    Plaintext,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
