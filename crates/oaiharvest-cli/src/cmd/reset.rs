//! Reset subcommand - abandon a stuck resumption token

use anyhow::{Context, Result};
use clap::Args;

use oaiharvest_state::HarvestState;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Repository name
    #[arg(short, long)]
    pub name: String,
}

pub fn run(args: ResetArgs, config: &Config) -> Result<()> {
    let mut state = HarvestState::open(&config.state.dir, &args.name)
        .context("Failed to open harvest state")?;
    let abandoned = state.resumption_token().map(str::to_string);
    state.set_to_last_clean_state()?;
    let from = state.checkpoint().from_string();
    state.close()?;

    match abandoned {
        Some(token) => log::info!("{}: abandoned token {token}", args.name),
        None => log::info!("{}: no pending token", args.name),
    }
    super::print_summary(
        &args.name,
        &[
            ("Resumption token", "-".to_string()),
            ("From", from.unwrap_or_else(|| "-".to_string())),
        ],
    );
    Ok(())
}
