//! Clap derive structures for the `uwbctl` CLI.
//!
//! Kept free of workspace crates so `build.rs` can render man pages from it.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// uwbctl -- drive UWB ranging sessions from the command line
#[derive(Debug, Parser)]
#[command(
    name = "uwbctl",
    version,
    about = "Run and configure UWB ranging sessions",
    long_about = "Runs ranging sessions against the simulated radio and manages the\n\
        device settings (display name, device uuid, role, profile) that\n\
        define this endpoint.",
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
    /// Settings file (defaults to the platform config directory)
    #[arg(long, env = "UWBCTL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "UWBCTL_OUTPUT",
        default_value = "plain",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines (default)
    Plain,
    /// Pretty table where the data is tabular, plain lines otherwise
    Table,
    /// JSON (one document per event when streaming)
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Session Enums ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Drive the session
    #[value(alias = "controller")]
    Initiator,
    /// Answer an initiator
    #[value(alias = "controlee")]
    Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileArg {
    /// One-to-one precision ranging
    #[value(alias = "unicast")]
    UnicastPrecision,
    /// One-to-many precision ranging (initiator only)
    #[value(alias = "multicast")]
    MulticastPrecision,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a ranging session and print its events
    #[command(alias = "r")]
    Range(RangeArgs),

    /// Manage device settings
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Range ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RangeArgs {
    /// Stop after this long (e.g. "10s", "2m"); runs until Ctrl-C otherwise
    #[arg(long, short = 'd', value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Stop after this many position updates
    #[arg(long, short = 'n')]
    pub count: Option<u64>,

    /// Role for this run (overrides settings, not persisted)
    #[arg(long, short = 'r')]
    pub role: Option<RoleArg>,

    /// Profile for this run (overrides settings, not persisted)
    #[arg(long, short = 'p')]
    pub profile: Option<ProfileArg>,

    /// Display name for this run (overrides settings, not persisted)
    #[arg(long)]
    pub name: Option<String>,

    /// Send this text to the peer out of band once ranging starts
    #[arg(long, short = 'm')]
    pub message: Option<String>,

    /// Time between simulated measurements (e.g. "50ms")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// Make the simulated radio fail after this many measurements
    #[arg(long, hide = true)]
    pub fail_after: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the current resolved settings
    Show,

    /// Print the settings file path
    Path,

    /// Set the device display name
    SetName {
        /// New display name (must not contain '|')
        name: String,
    },

    /// Set the preferred ranging role
    SetRole {
        role: RoleArg,
    },

    /// Set the preferred ranging profile
    SetProfile {
        profile: ProfileArg,
    },

    /// Generate a new device uuid (changes this endpoint's id)
    ResetUuid,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
