//! Get-record subcommand - fetch one record and print its metadata

use anyhow::{Context, Result};
use clap::Args;

use oaiharvest_client::{HttpTransport, OaiClient};
use oaiharvest_core::HttpConfig;

#[derive(Args, Debug)]
pub struct GetRecordArgs {
    /// OAI-PMH base URL
    #[arg(short, long)]
    pub base_url: String,

    /// Record identifier
    #[arg(short, long)]
    pub identifier: String,

    /// Metadata prefix
    #[arg(short, long, default_value = "oai_dc")]
    pub prefix: String,
}

pub fn run(args: GetRecordArgs, http: &HttpConfig) -> Result<()> {
    let transport = HttpTransport::new(http).context("Failed to build HTTP client")?;
    let client = OaiClient::new(&args.base_url, transport)
        .with_context(|| format!("Invalid base URL: {}", args.base_url))?;

    let record = client.get_record(&args.identifier, &args.prefix)?;

    log::info!(
        "{} datestamp={} sets={:?}",
        record.identifier(),
        record.header.datestamp,
        record.header.set_specs
    );
    match &record.metadata {
        Some(metadata) => println!("{metadata}"),
        None if record.is_deleted() => eprintln!("{}: deleted", record.identifier()),
        None => eprintln!("{}: no metadata", record.identifier()),
    }
    Ok(())
}
