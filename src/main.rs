use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use provider_agent::config::Config;
use provider_agent::coordinator::HttpCoordinator;
use provider_agent::driver::{Driver, DriverConfig};
use provider_agent::executor::ContainerExecutor;
use provider_agent::journal::ResultJournal;
use provider_agent::runtime::{ContainerRuntime, DockerCli};

fn setup_logging(config: &Config, to_stderr: bool) -> Result<()> {
    let level = config.log_level.as_deref().unwrap_or("info");
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if to_stderr {
        builder.target(env_logger::Target::Stderr);
        builder.init();
        return Ok(());
    }

    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("provider-agent")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("provider-agent.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Wire the driver from config. With `check_runtime`, an unreachable
/// container runtime is a fatal bootstrap error.
async fn build_driver(config: &Config, check_runtime: bool) -> Result<Driver> {
    let runtime = Arc::new(DockerCli::new(config.runtime.binary.clone()));
    if check_runtime {
        runtime
            .ping()
            .await
            .context(format!("Failed to connect to container runtime '{}'", runtime.binary()))?;
        info!("Connected to container runtime '{}'", runtime.binary());
    }

    fs::create_dir_all(&config.storage.outputs_dir).context(format!(
        "Failed to create outputs directory {}",
        config.storage.outputs_dir.display()
    ))?;

    let journal = ResultJournal::open(&config.storage.state_dir).context("Failed to open result journal")?;
    let coordinator = Arc::new(HttpCoordinator::new(config.coordinator_config())?);
    let executor = ContainerExecutor::new(runtime, config.executor_config());

    Ok(Driver::new(
        DriverConfig::new(config.poll_interval()),
        executor,
        coordinator,
        journal,
    ))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Run => handle_run_command(config).await,
        Commands::Once => handle_once_command(config).await,
        Commands::Replay => handle_replay_command(config).await,
        Commands::ShowConfig => handle_show_config_command(config),
    }
}

async fn handle_run_command(config: &Config) -> Result<()> {
    let mut driver = build_driver(config, true).await?;
    println!(
        "{} provider {} polling {} every {:?}",
        "Starting:".green(),
        config.coordinator.provider,
        config.coordinator.url,
        config.poll_interval()
    );
    driver.run().await;
    Ok(())
}

async fn handle_once_command(config: &Config) -> Result<()> {
    let mut driver = build_driver(config, true).await?;
    let cycle = driver.run_once().await;

    if cycle.poll_failed {
        println!("{} could not poll {}", "Failed:".red(), config.coordinator.url);
    }
    println!(
        "{} {} polled, {} succeeded, {} failed, {} reported, {} unreported",
        "Cycle:".cyan(),
        cycle.polled,
        cycle.succeeded,
        cycle.failed,
        cycle.reported,
        cycle.report_failures
    );
    Ok(())
}

async fn handle_replay_command(config: &Config) -> Result<()> {
    let mut driver = build_driver(config, false).await?;
    let pending = driver.journal().pending().len();
    if pending == 0 {
        println!("{}", "No journaled results to replay".green());
        return Ok(());
    }

    let replay = driver.replay_pending().await;
    println!(
        "{} {} replayed, {} still pending",
        "Replay:".cyan(),
        replay.replayed,
        replay.still_pending
    );
    Ok(())
}

fn handle_show_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render config")?;
    print!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);

    // Setup logging once the level is known
    setup_logging(&config, cli.log_stderr).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    if cli.command != Some(Commands::ShowConfig) {
        config.validate().context("Invalid configuration")?;
    }

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
