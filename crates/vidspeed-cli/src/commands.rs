//! CLI command definitions using clap

use crate::config::LogFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Vidspeed: drive per-page playback-rate control against a simulated browser
#[derive(Parser, Debug)]
#[command(name = "vidspeed")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log format on stderr
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Extension configuration file (YAML)
    #[arg(short, long, global = true, env = "VIDSPEED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scripted session against one simulated tab
    ///
    /// Steps run in order. A bare step command (speed-up, speed-down,
    /// speed-reset) is a keyboard shortcut; other steps:
    ///   panel:<command>   press a panel button
    ///   preset:<speed>    click a panel preset
    ///   shortcut:<name>   fire any shortcut name
    ///   check             refresh the panel status
    ///   add-media[:playing]  append a media element
    ///   remove-media:<n>  remove the n-th media element
    ///   wait:<ms>         let time pass
    #[command(verbatim_doc_comment)]
    Simulate(SimulateArgs),

    /// Print the speed ladder
    Ladder(LadderArgs),

    /// Read or write a settings file
    Settings(SettingsArgs),

    /// Show or check extension configuration
    Config(ConfigArgs),
}

/// Arguments for the simulate command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct SimulateArgs {
    /// Session steps
    #[arg(required = true)]
    pub steps: Vec<String>,

    /// URL of the simulated page
    #[arg(long, default_value = "https://www.youtube.com/watch?v=demo")]
    pub url: String,

    /// Media elements in the page at load
    #[arg(long, default_value = "1")]
    pub media: usize,

    /// Start the media playing
    #[arg(long)]
    pub playing: bool,

    /// The page loaded before the extension (no controller yet)
    #[arg(long)]
    pub no_controller: bool,

    /// The page refuses script injection
    #[arg(long)]
    pub unscriptable: bool,

    /// Override the injection retry grace period
    #[arg(long)]
    pub grace_ms: Option<u64>,

    /// Persist panel settings in this file instead of memory
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Print the session report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the ladder command
#[derive(Parser, Debug)]
pub struct LadderArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the settings command
#[derive(Parser, Debug)]
pub struct SettingsArgs {
    /// Settings file
    #[arg(short, long, default_value = "vidspeed-settings.json")]
    pub file: PathBuf,

    /// Settings action
    #[command(subcommand)]
    pub action: SettingsAction,
}

/// Settings actions
#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print all settings as JSON
    Show,
    /// Print one setting
    Get {
        /// Setting key (showNotifications, rememberSpeed, lastSpeed)
        key: String,
    },
    /// Write one setting
    Set {
        /// Setting key (showNotifications, rememberSpeed, lastSpeed)
        key: String,
        /// New value (true/false or a speed)
        value: String,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config action
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as YAML
    Show,
    /// Validate a configuration file
    Check {
        /// YAML file to validate
        file: PathBuf,
    },
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}
