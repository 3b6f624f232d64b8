//! Harvest subcommand - one incremental run against a repository

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;

use oaiharvest_client::{ArchivingTransport, HttpTransport, OaiClient, Transport};
use oaiharvest_core::{HttpConfig, ProgressContext};
use oaiharvest_state::{HarvestState, IdentifierSet};

use crate::config::Config;
use crate::runner::{self, HarvestJob, RunOutcome};
use crate::sink::FileSink;

#[derive(Args, Debug)]
pub struct HarvestArgs {
    /// Repository name (state and output are kept per name)
    #[arg(short, long)]
    pub name: String,

    /// OAI-PMH base URL
    #[arg(short, long)]
    pub base_url: String,

    /// Metadata prefix
    #[arg(short, long, default_value = "oai_dc")]
    pub prefix: String,

    /// Restrict to a set
    #[arg(short, long)]
    pub set: Option<String>,

    /// Harvest from this date (YYYY-MM-DD) instead of the recovered one
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Keep every request URL and raw response under the archive directory
    #[arg(long)]
    pub archive: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("Invalid date format: {e}"))
}

pub fn run(
    args: HarvestArgs,
    config: &Config,
    http: &HttpConfig,
    progress: &ProgressContext,
) -> Result<()> {
    let transport: Box<dyn Transport> = {
        let http = HttpTransport::new(http).context("Failed to build HTTP client")?;
        if args.archive {
            let dir = config.output.archive_dir.join(&args.name);
            log::info!("Archiving requests to {}", dir.display());
            Box::new(
                ArchivingTransport::new(http, &dir)
                    .with_context(|| format!("Failed to open archive {}", dir.display()))?,
            )
        } else {
            Box::new(http)
        }
    };
    let client = OaiClient::new(&args.base_url, transport)
        .with_context(|| format!("Invalid base URL: {}", args.base_url))?;

    let mut state = HarvestState::open(&config.state.dir, &args.name)
        .context("Failed to open harvest state")?;
    let mut ids = IdentifierSet::open(&config.state.dir, &args.name)
        .context("Failed to open identifier set")?;
    let mut sink = FileSink::open(&config.output.dir.join(&args.name))?;

    let job = HarvestJob {
        metadata_prefix: args.prefix,
        set: args.set,
        from_override: args.from,
    };

    log::info!("Harvesting {} from {}", args.name, client.base_url());
    let pb = progress.run_line(&args.name);
    let result = runner::run(&client, &mut state, &mut ids, &mut sink, &job, &pb);
    pb.finish_and_clear();

    ids.close().context("Failed to write identifier set")?;
    state.close().context("Failed to close run log")?;
    let summary = result?;

    let (status, counts) = match &summary.outcome {
        RunOutcome::Completed { counts } => ("completed".to_string(), Some(*counts)),
        RunOutcome::Stopped { counts } => ("stopped (resumable)".to_string(), Some(*counts)),
        RunOutcome::Failed { kind, .. } => (format!("failed ({kind})"), None),
    };
    let mut rows = vec![
        ("Status", status),
        ("Pages", summary.pages.to_string()),
        ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
    ];
    if let Some(counts) = counts {
        rows.push(("Harvested/Uploaded/Deleted/Total", counts.to_string()));
    }
    super::print_summary(&args.name, &rows);

    if let RunOutcome::Failed { kind, message } = summary.outcome {
        anyhow::bail!("{kind}: {message}");
    }
    Ok(())
}
