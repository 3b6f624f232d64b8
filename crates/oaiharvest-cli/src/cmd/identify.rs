//! Identify subcommand - show a repository's self-description

use anyhow::{Context, Result};
use clap::Args;

use oaiharvest_client::{HttpTransport, OaiClient};
use oaiharvest_core::HttpConfig;

#[derive(Args, Debug)]
pub struct IdentifyArgs {
    /// OAI-PMH base URL
    #[arg(short, long)]
    pub base_url: String,
}

pub fn run(args: IdentifyArgs, http: &HttpConfig) -> Result<()> {
    let transport = HttpTransport::new(http).context("Failed to build HTTP client")?;
    let client = OaiClient::new(&args.base_url, transport)
        .with_context(|| format!("Invalid base URL: {}", args.base_url))?;

    let info = client.identify()?;

    let optional = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    super::print_summary(
        "Repository",
        &[
            ("Name", info.repository_name),
            ("Base URL", info.base_url),
            ("Protocol version", info.protocol_version),
            ("Admin email", info.admin_emails.join(", ")),
            ("Earliest datestamp", optional(&info.earliest_datestamp)),
            ("Deleted records", optional(&info.deleted_record)),
            ("Granularity", optional(&info.granularity)),
        ],
    );
    Ok(())
}
