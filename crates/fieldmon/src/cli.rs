//! Clap derive structures for the `fieldmon` CLI.
//!
//! Defines the command tree, global flags, and shared types. Kept free of
//! crate-internal imports so `build.rs` can include it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fieldmon -- live monitoring console for gateway-attached field devices
#[derive(Debug, Parser)]
#[command(
    name = "fieldmon",
    version,
    about = "Watch and control field devices through a monitoring gateway",
    long_about = "Opens the gateway's live WebSocket feed for one or more devices,\n\
        keeps the latest reading per device, and reports connection events.\n\n\
        Gateways and device selections are stored as named profiles.",
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
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "FIELDMON_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway base URL (overrides profile)
    #[arg(long, short = 'g', env = "FIELDMON_GATEWAY", global = true)]
    pub gateway: Option<String>,

    /// Config file path (overrides the platform default)
    #[arg(long, env = "FIELDMON_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Device to stream; repeat or comma-separate for multi-device mode
    #[arg(long, short = 'd', value_delimiter = ',', global = true)]
    pub device: Vec<String>,

    /// Streaming interval in seconds (overrides profile)
    #[arg(long, short = 'i', global = true)]
    pub interval: Option<f64>,

    /// Restrict the stream to these parameters (comma-separated)
    #[arg(long, value_delimiter = ',', global = true)]
    pub parameters: Vec<String>,

    /// Output format [default: table, or `defaults.output` from the config]
    #[arg(long, short = 'o', env = "FIELDMON_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for the gateway handshake
    #[arg(
        long,
        env = "FIELDMON_HANDSHAKE_TIMEOUT",
        default_value = "10",
        global = true
    )]
    pub handshake_timeout: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON, one document per line
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

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live readings and connection events until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Write a parameter value on the streamed device
    Write(WriteArgs),

    /// Measure round-trip latency to the gateway
    #[command(long_about = "Measure round-trip latency to the gateway.\n\n\
        Pongs carry no sequence number, so the first pong after each ping\n\
        closes its round trip. A pong answering the transport's own\n\
        heartbeat can arrive first and report a shorter time.")]
    Ping(PingArgs),

    /// Print the WebSocket URL for the resolved device selection
    Url,

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many data frames
    #[arg(long, short = 'n')]
    pub count: Option<u64>,

    /// Print only event-log lines, not readings
    #[arg(long)]
    pub events_only: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WRITE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Parameter name
    pub parameter: String,

    /// New value; parsed as JSON when possible, otherwise sent as a string
    pub value: String,

    /// Always send the value as a string
    #[arg(long)]
    pub raw: bool,

    /// Ask the gateway to bypass its safety checks
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Seconds to wait for the write result
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PingArgs {
    /// Number of pings to send
    #[arg(long, short = 'n', default_value = "1")]
    pub count: u32,

    /// Seconds to wait for each pong
    #[arg(long, default_value = "5")]
    pub timeout: u64,
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

    /// Create or update a profile from --gateway, --device, --interval
    /// and --parameters
    Add {
        /// Profile name
        name: String,

        /// Also make it the default profile
        #[arg(long)]
        default: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
