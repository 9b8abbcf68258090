//! Vidspeed CLI: scripted playback-rate sessions
//!
//! ## Usage
//!
//! ```bash
//! vidspeed simulate speed-up speed-up preset:1.5   # Run a session
//! vidspeed simulate --no-controller speed-down      # Exercise injection
//! vidspeed ladder --json                            # Print the ladder
//! vidspeed settings set rememberSpeed true          # Edit settings
//! ```

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use vidspeed::{
    format_speed, ExtensionConfig, FileStore, MemoryStore, SettingKey, SettingsStore, SpeedLadder,
};
use vidspeed_cli::{
    logging, session, Cli, CliConfig, CliError, CliResult, Commands, ConfigAction, ConfigArgs,
    LadderArgs, SettingsAction, SettingsArgs, SimulateArgs, Verbosity,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    logging::init(config.verbosity, config.log_format);

    match cli.command {
        Commands::Simulate(args) => run_simulate(config, &args),
        Commands::Ladder(args) => run_ladder(&args),
        Commands::Settings(args) => run_settings(&args),
        Commands::Config(args) => run_config(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliResult<CliConfig> {
    let extension = match &cli.config {
        Some(path) => ExtensionConfig::load(path)?,
        None => ExtensionConfig::default(),
    };
    Ok(CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_log_format(cli.log_format.into())
        .with_extension(extension))
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?)
}

fn run_simulate(config: CliConfig, args: &SimulateArgs) -> CliResult<()> {
    let steps = session::parse_steps(&args.steps)?;
    let mut extension = config.extension;
    if let Some(ms) = args.grace_ms {
        extension = extension.with_retry_grace_ms(ms);
    }
    let tab = session::build_tab(args);

    let report = runtime()?.block_on(async {
        match &args.settings {
            Some(path) => session::run(extension, tab, Arc::new(FileStore::new(path)), &steps).await,
            None => session::run(extension, tab, Arc::new(MemoryStore::new()), &steps).await,
        }
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !config.verbosity.is_quiet() {
        print!("{report}");
    }
    Ok(())
}

fn run_ladder(args: &LadderArgs) -> CliResult<()> {
    let ladder = SpeedLadder::standard();
    if args.json {
        let speeds: Vec<f64> = ladder.iter().collect();
        println!("{}", serde_json::to_string(&speeds)?);
        return Ok(());
    }
    for (index, speed) in ladder.iter().enumerate() {
        let marker = if index == ladder.normal_index() { "  (normal)" } else { "" };
        println!("{index:>2}  {:>6}{marker}", format_speed(speed));
    }
    Ok(())
}

fn run_settings(args: &SettingsArgs) -> CliResult<()> {
    let store = FileStore::new(&args.file);
    runtime()?.block_on(async {
        match &args.action {
            SettingsAction::Show => {
                let settings = store.load().await?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            SettingsAction::Get { key } => {
                let key: SettingKey = key.parse()?;
                println!("{}", store.load().await?.get(key));
            }
            SettingsAction::Set { key, value } => {
                let key: SettingKey = key.parse()?;
                let value = key.parse_value(value)?;
                store.save(key, value).await?;
                println!("{key} = {value}");
            }
        }
        Ok::<(), CliError>(())
    })
}

fn run_config(config: &CliConfig, args: &ConfigArgs) -> CliResult<()> {
    match &args.action {
        ConfigAction::Show => print!("{}", config.extension.to_yaml()?),
        ConfigAction::Check { file } => {
            ExtensionConfig::load(file)
                .map_err(|e| CliError::config(format!("{}: {e}", file.display())))?;
            println!("{}: ok", file.display());
        }
    }
    Ok(())
}
