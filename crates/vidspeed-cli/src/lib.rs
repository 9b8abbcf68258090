//! Vidspeed CLI library
//!
//! Command definitions, configuration and the scripted-session runner
//! behind the `vidspeed` binary.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod logging;
pub mod session;

pub use commands::{
    Cli, Commands, ConfigAction, ConfigArgs, LadderArgs, LogFormatArg, SettingsAction,
    SettingsArgs, SimulateArgs,
};
pub use config::{CliConfig, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use session::{SessionReport, Step, StepRecord};
