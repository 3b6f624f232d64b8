//! oaiharvest - incremental OAI-PMH harvester
//!
//! Harvests metadata records from OAI-PMH repositories, keeping a
//! crash-safe cursor and run log per repository so every run continues
//! exactly where the previous one stopped.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;
mod runner;
mod sink;

use config::Config;

#[derive(Parser)]
#[command(name = "oaiharvest")]
#[command(about = "Incremental OAI-PMH harvester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./oaiharvest.toml or ~/.config/oaiharvest/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one incremental harvest for a repository
    Harvest(cmd::harvest::HarvestArgs),
    /// Show a repository's Identify response
    Identify(cmd::identify::IdentifyArgs),
    /// Fetch a single record and print its metadata
    GetRecord(cmd::get_record::GetRecordArgs),
    /// Show checkpoint, identifier count and recent runs
    Status(cmd::status::StatusArgs),
    /// Abandon a pending resumption token, keeping the from-date
    Reset(cmd::reset::ResetArgs),
    /// Remove all harvested records and clear the checkpoint
    Delete(cmd::delete::DeleteArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = oaiharvest_core::ProgressContext::new();

    // Logging:
    //   TTY:     quiet (warn) unless --debug; the spinner shows activity
    //   non-TTY: info unless --debug; logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    oaiharvest_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    // HTTP settings: config file defaults, CLI overrides
    let http = oaiharvest_core::HttpConfig {
        read_timeout: Duration::from_secs(cli.read_timeout.unwrap_or(config.http.read_timeout)),
        connect_timeout: Duration::from_secs(
            cli.connect_timeout.unwrap_or(config.http.connect_timeout),
        ),
        ..Default::default()
    };

    match cli.command {
        Command::Harvest(args) => {
            oaiharvest_core::install_signal_handlers()?;
            cmd::harvest::run(args, &config, &http, &progress)
        }
        Command::Identify(args) => cmd::identify::run(args, &http),
        Command::GetRecord(args) => cmd::get_record::run(args, &http),
        Command::Status(args) => cmd::status::run(args, &config),
        Command::Reset(args) => cmd::reset::run(args, &config),
        Command::Delete(args) => cmd::delete::run(args, &config),
        Command::Config => {
            cmd::print_summary(
                "Setting",
                &[
                    ("State directory", config.state.dir.display().to_string()),
                    ("Output directory", config.output.dir.display().to_string()),
                    (
                        "Archive directory",
                        config.output.archive_dir.display().to_string(),
                    ),
                    ("Read timeout", format!("{}s", http.read_timeout.as_secs())),
                    (
                        "Connect timeout",
                        format!("{}s", http.connect_timeout.as_secs()),
                    ),
                    ("User agent", http.user_agent.clone()),
                ],
            );
            Ok(())
        }
    }
}
